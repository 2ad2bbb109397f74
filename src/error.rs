use thiserror::Error;

/// A structural mismatch between a JSON value and the [Schema](crate::core::schema::Schema) it
/// was validated against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema mismatch at `{path}`: expected {expected}, received {received}")]
pub struct SchemaError {
    /// JSON path of the offending value, rooted at `$`.
    pub path: String,
    pub expected: String,
    pub received: String,
}

/// A compact signed token that could not be decoded.
#[derive(Debug, Error)]
pub enum TokenFormatError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),
    #[error("payload segment is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload segment is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The caller asked for a credential that cannot be expressed as a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSpecError {
    #[error("`{value}` is not a valid principal: {reason}")]
    Principal { value: String, reason: String },
    #[error("the credential type must not be empty")]
    EmptyCredentialType,
}

/// Errors surfaced by the VC flow engine.
///
/// Only failures of outgoing construction, host failures and explicit protocol error results
/// reach the caller. Malformed incoming traffic is logged and ignored.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    TokenFormat(#[from] TokenFormatError),
    #[error("identity provider returned error `{code}` (version {version})")]
    ProtocolErrorResult { version: String, code: String },
    #[error(transparent)]
    InvalidSpec(#[from] InvalidSpecError),
    #[error("no identity is available to request a credential for")]
    MissingIdentity,
    #[error("a VC flow is already in progress")]
    FlowInProgress,
    #[error("the VC context has been unmounted")]
    Unmounted,
    #[error("failed to encode credential request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Host(#[from] anyhow::Error),
}
