//! Decoding of compact signed tokens (`<header>.<payload>.<signature>`).
//!
//! The signature segment is never inspected: a decoded token is NOT authenticated.
use base64::prelude::*;
use serde_json::Value as Json;

use crate::error::{FlowError, TokenFormatError};

use super::schema::Validate;

/// Decode the payload segment of a compact token into JSON.
pub fn decode(token: &str) -> Result<Json, TokenFormatError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_header, payload, _signature] = segments.as_slice() else {
        return Err(TokenFormatError::Segments(segments.len()));
    };

    // Some encoders pad the segments even though compact serialization forbids it.
    let bytes = BASE64_URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decode the payload segment of a compact token and validate it as a `T`.
pub fn decode_as<T: Validate>(token: &str) -> Result<T, FlowError> {
    let payload = decode(token)?;
    Ok(T::parse(&payload)?)
}
