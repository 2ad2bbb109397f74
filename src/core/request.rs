use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::InvalidSpecError;

use super::{
    credential_spec::CredentialSpec,
    principal::PrincipalText,
    schema::{self, Schema, Validate},
};

literal_tag!(
    /// The JSON-RPC version every message of the flow carries.
    JsonRpcVersion = "2.0"
);

literal_tag!(RequestCredentialMethod = "request_credential");

/// Correlation id of the credential request.
///
/// Only one request is in flight per flow, so a constant id is sufficient.
pub const FLOW_REQUEST_ID: i64 = 1;

/// JSON-RPC request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerData {
    pub origin: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canister_id: Option<PrincipalText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    pub issuer: IssuerData,
    pub credential_spec: CredentialSpec,
    pub credential_subject: PrincipalText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_origin: Option<String>,
}

/// The credential request sent by the relying party once the identity provider is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFlowRequest", into = "RawFlowRequest")]
pub struct FlowRequest {
    pub id: RequestId,
    /// Emitted as `jsonrpc`, read from `jsonrpc` or `protocolVersion`.
    pub protocol_version: JsonRpcVersion,
    pub method: RequestCredentialMethod,
    pub params: RequestParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFlowRequest {
    id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jsonrpc: Option<JsonRpcVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protocol_version: Option<JsonRpcVersion>,
    method: RequestCredentialMethod,
    params: RequestParams,
}

impl TryFrom<RawFlowRequest> for FlowRequest {
    type Error = &'static str;

    fn try_from(raw: RawFlowRequest) -> Result<Self, &'static str> {
        let protocol_version = raw
            .jsonrpc
            .or(raw.protocol_version)
            .ok_or("one of 'jsonrpc' and 'protocolVersion' is required")?;

        Ok(FlowRequest {
            id: raw.id,
            protocol_version,
            method: raw.method,
            params: raw.params,
        })
    }
}

impl From<FlowRequest> for RawFlowRequest {
    fn from(value: FlowRequest) -> Self {
        RawFlowRequest {
            id: value.id,
            jsonrpc: Some(value.protocol_version),
            protocol_version: None,
            method: value.method,
            params: value.params,
        }
    }
}

impl Validate for FlowRequest {
    fn schema() -> Schema {
        schema::flow_request()
    }
}

/// Build the request for a credential about `subject_principal`, issued by `issuer_origin`.
pub fn build_request(
    subject_principal: &str,
    spec: &CredentialSpec,
    issuer_origin: &Url,
) -> Result<FlowRequest, InvalidSpecError> {
    RequestBuilder::new(spec.clone(), issuer_origin.clone()).build(subject_principal)
}

/// Builds [FlowRequest]s for a fixed credential and issuer, varying only the subject.
#[derive(Debug, Clone)]
#[must_use]
pub struct RequestBuilder {
    spec: CredentialSpec,
    issuer_origin: Url,
    issuer_canister_id: Option<PrincipalText>,
    derivation_origin: Option<String>,
}

impl RequestBuilder {
    pub fn new(spec: CredentialSpec, issuer_origin: Url) -> Self {
        Self {
            spec,
            issuer_origin,
            issuer_canister_id: None,
            derivation_origin: None,
        }
    }

    /// Identify the issuer by canister as well as by origin.
    pub fn with_issuer_canister_id(mut self, canister_id: PrincipalText) -> Self {
        self.issuer_canister_id = Some(canister_id);
        self
    }

    /// Request the subject principal as seen from `origin` rather than from the caller's own
    /// origin.
    pub fn with_derivation_origin(mut self, origin: impl Into<String>) -> Self {
        self.derivation_origin = Some(origin.into());
        self
    }

    /// Build the request. Deterministic: the same subject always yields an equal request.
    pub fn build(&self, subject_principal: &str) -> Result<FlowRequest, InvalidSpecError> {
        self.spec.check()?;
        let credential_subject = PrincipalText::try_from(subject_principal)?;

        Ok(FlowRequest {
            id: RequestId::Number(FLOW_REQUEST_ID.into()),
            protocol_version: JsonRpcVersion,
            method: RequestCredentialMethod,
            params: RequestParams {
                issuer: IssuerData {
                    origin: self.issuer_origin.clone(),
                    canister_id: self.issuer_canister_id.clone(),
                },
                credential_spec: self.spec.clone(),
                credential_subject,
                derivation_origin: self.derivation_origin.clone(),
            },
        })
    }
}
