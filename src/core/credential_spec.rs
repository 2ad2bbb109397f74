use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InvalidSpecError;

/// Credential type attesting a Gitcoin Passport score.
pub const GITCOIN_PASSPORT_SCORE: &str = "GitcoinPassportScore";

/// A typed credential argument. Serialized untagged: a JSON string or integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    String(String),
    Int(i32),
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        ArgumentValue::String(value.to_owned())
    }
}

impl From<String> for ArgumentValue {
    fn from(value: String) -> Self {
        ArgumentValue::String(value)
    }
}

impl From<i32> for ArgumentValue {
    fn from(value: i32) -> Self {
        ArgumentValue::Int(value)
    }
}

/// Identifies the credential being requested and parameterizes it.
///
/// Arguments are kept ordered by key, so the same spec always produces the same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSpec {
    credential_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<BTreeMap<String, ArgumentValue>>,
}

impl CredentialSpec {
    pub fn new(credential_type: impl Into<String>) -> Result<Self, InvalidSpecError> {
        let credential_type = credential_type.into();
        if credential_type.is_empty() {
            return Err(InvalidSpecError::EmptyCredentialType);
        }
        Ok(Self {
            credential_type,
            arguments: None,
        })
    }

    /// A `GitcoinPassportScore` credential with the given minimum score.
    pub fn gitcoin_passport_score(min_score: i32) -> Self {
        Self {
            credential_type: GITCOIN_PASSPORT_SCORE.to_owned(),
            arguments: None,
        }
        .with_argument("minScore", min_score)
    }

    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        self.arguments
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn credential_type(&self) -> &str {
        &self.credential_type
    }

    /// The arguments as an ordered sequence of key/typed-value pairs.
    pub fn arguments(&self) -> Vec<(&str, &ArgumentValue)> {
        self.arguments
            .iter()
            .flatten()
            .map(|(key, value)| (key.as_str(), value))
            .collect()
    }

    pub fn argument(&self, key: &str) -> Option<&ArgumentValue> {
        self.arguments.as_ref()?.get(key)
    }

    pub(crate) fn check(&self) -> Result<(), InvalidSpecError> {
        if self.credential_type.is_empty() {
            return Err(InvalidSpecError::EmptyCredentialType);
        }
        Ok(())
    }
}
