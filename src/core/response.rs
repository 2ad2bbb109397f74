use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::{
    request::{JsonRpcVersion, RequestId},
    schema::{self, Schema, Validate},
};

literal_tag!(
    /// Method of the message the identity provider posts once its window can take a request.
    FlowReadyMethod = "vc-flow-ready"
);

literal_tag!(ProtocolErrorVersion = "1");

/// The readiness signal posted by the identity provider window.
///
/// Only `method` is significant; the version member is carried as received, unchecked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReady {
    #[serde(rename = "jsonrpc", default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<Json>,
    pub method: FlowReadyMethod,
}

impl Default for FlowReady {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowReady {
    pub fn new() -> Self {
        Self {
            protocol_version: Some(JsonRpcVersion::VALUE.into()),
            method: FlowReadyMethod,
        }
    }
}

impl Validate for FlowReady {
    fn schema() -> Schema {
        schema::flow_ready()
    }
}

/// An error reported by the identity provider in place of a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    pub version: ProtocolErrorVersion,
    pub code: String,
}

/// The outcome carried by a [FlowResponse]: exactly one of a presentation or an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFlowResult", into = "RawFlowResult")]
pub enum FlowResult {
    /// A compact token wrapping the verifiable presentation.
    VerifiablePresentation(String),
    Error(ProtocolError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFlowResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verifiable_presentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ProtocolError>,
}

impl TryFrom<RawFlowResult> for FlowResult {
    type Error = &'static str;

    fn try_from(raw: RawFlowResult) -> Result<Self, &'static str> {
        match (raw.verifiable_presentation, raw.error) {
            (Some(vp), None) => Ok(FlowResult::VerifiablePresentation(vp)),
            (None, Some(error)) => Ok(FlowResult::Error(error)),
            (Some(_), Some(_)) => Err("'verifiablePresentation' and 'error' are mutually exclusive"),
            (None, None) => Err("one of 'verifiablePresentation' and 'error' is required"),
        }
    }
}

impl From<FlowResult> for RawFlowResult {
    fn from(value: FlowResult) -> Self {
        match value {
            FlowResult::VerifiablePresentation(vp) => RawFlowResult {
                verifiable_presentation: Some(vp),
                error: None,
            },
            FlowResult::Error(error) => RawFlowResult {
                verifiable_presentation: None,
                error: Some(error),
            },
        }
    }
}

/// The final message of the flow, posted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFlowResponse", into = "RawFlowResponse")]
pub struct FlowResponse {
    pub id: Option<RequestId>,
    /// Emitted as `jsonrpc`, read from `jsonrpc` or `protocolVersion`.
    pub protocol_version: Option<JsonRpcVersion>,
    pub result: FlowResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFlowResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jsonrpc: Option<JsonRpcVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protocol_version: Option<JsonRpcVersion>,
    result: FlowResult,
}

impl From<RawFlowResponse> for FlowResponse {
    fn from(raw: RawFlowResponse) -> Self {
        FlowResponse {
            id: raw.id,
            protocol_version: raw.jsonrpc.or(raw.protocol_version),
            result: raw.result,
        }
    }
}

impl From<FlowResponse> for RawFlowResponse {
    fn from(value: FlowResponse) -> Self {
        RawFlowResponse {
            id: value.id,
            jsonrpc: value.protocol_version,
            protocol_version: None,
            result: value.result,
        }
    }
}

impl FlowResponse {
    /// A successful response answering request `id`.
    pub fn presentation(id: RequestId, token: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            protocol_version: Some(JsonRpcVersion),
            result: FlowResult::VerifiablePresentation(token.into()),
        }
    }

    /// An error response answering request `id`.
    pub fn error(id: RequestId, code: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            protocol_version: Some(JsonRpcVersion),
            result: FlowResult::Error(ProtocolError {
                version: ProtocolErrorVersion,
                code: code.into(),
            }),
        }
    }
}

impl Validate for FlowResponse {
    fn schema() -> Schema {
        schema::flow_response()
    }
}
