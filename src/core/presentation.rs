//! Payloads of the presentation token returned by the identity provider and of the credential
//! tokens it wraps.
use serde::{Deserialize, Serialize};

use crate::{error::FlowError, utils::NonEmptyVec};

use super::{
    schema::{self, Schema, Validate},
    token,
};

literal_tag!(CredentialsV1Context = "https://www.w3.org/2018/credentials/v1");

literal_tag!(VerifiablePresentationType = "VerifiablePresentation");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationClaims {
    #[serde(rename = "@context")]
    pub context: CredentialsV1Context,
    #[serde(rename = "type")]
    pub presentation_type: VerifiablePresentationType,
    /// Compact credential tokens, in presentation order.
    pub verifiable_credential: NonEmptyVec<String>,
}

/// Decoded payload of a presentation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiablePresentation {
    pub iss: String,
    pub vp: PresentationClaims,
}

impl VerifiablePresentation {
    /// Decode and validate every wrapped credential, preserving their order.
    ///
    /// Fails on the first credential that is not a well-formed [VerifiableCredential].
    pub fn decode_credentials(&self) -> Result<NonEmptyVec<VerifiableCredential>, FlowError> {
        self.vp
            .verifiable_credential
            .try_map(|jwt| token::decode_as::<VerifiableCredential>(jwt))
    }
}

impl Validate for VerifiablePresentation {
    fn schema() -> Schema {
        schema::verifiable_presentation()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdAliasClaim {
    pub has_id_alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAliasSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "InternetIdentityIdAlias")]
    pub id_alias: IdAliasClaim,
}

/// The passport score claim, either as requested (`{ "minScore": n }`) or as issued (`n`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PassportScoreClaim {
    MinScore {
        #[serde(rename = "minScore")]
        min_score: f64,
    },
    Score(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassportScoreSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "GitcoinPassportScore")]
    pub score: PassportScoreClaim,
}

/// The closed set of claims a credential can make about its subject.
///
/// Variants are tried in declaration order; the first that matches wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialSubject {
    InternetIdentityIdAlias(IdAliasSubject),
    GitcoinPassportScore(PassportScoreSubject),
}

impl CredentialSubject {
    /// Name of the credential type this subject belongs to.
    pub fn credential_type(&self) -> &'static str {
        match self {
            CredentialSubject::InternetIdentityIdAlias(_) => "InternetIdentityIdAlias",
            CredentialSubject::GitcoinPassportScore(_) => "GitcoinPassportScore",
        }
    }
}

impl Validate for CredentialSubject {
    fn schema() -> Schema {
        schema::credential_subject()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaims {
    #[serde(rename = "@context")]
    pub context: CredentialsV1Context,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub credential_subject: CredentialSubject,
}

/// Decoded payload of a credential token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiableCredential {
    pub exp: i64,
    pub iss: String,
    pub nbf: i64,
    pub jti: String,
    pub sub: String,
    pub vc: CredentialClaims,
}

impl Validate for VerifiableCredential {
    fn schema() -> Schema {
        schema::verifiable_credential()
    }
}
