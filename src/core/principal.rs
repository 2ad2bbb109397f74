use std::fmt;

use candid::Principal;
use serde::{Deserialize, Serialize};

use crate::error::InvalidSpecError;

/// The textual form of a principal, checked to be syntactically valid.
///
/// The original text is preserved so that values survive a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalText {
    text: String,
    principal: Principal,
}

impl PrincipalText {
    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl TryFrom<String> for PrincipalText {
    type Error = InvalidSpecError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        match Principal::from_text(&text) {
            Ok(principal) => Ok(Self { text, principal }),
            Err(e) => Err(InvalidSpecError::Principal {
                value: text,
                reason: e.to_string(),
            }),
        }
    }
}

impl TryFrom<&str> for PrincipalText {
    type Error = InvalidSpecError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        text.to_owned().try_into()
    }
}

impl From<Principal> for PrincipalText {
    fn from(principal: Principal) -> Self {
        Self {
            text: principal.to_text(),
            principal,
        }
    }
}

impl From<PrincipalText> for String {
    fn from(value: PrincipalText) -> Self {
        value.text
    }
}

impl fmt::Display for PrincipalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
