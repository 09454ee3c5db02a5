//! Stored object payload decoding.
//!
//! The object store may hand back a record as raw JSON, as base64-encoded
//! JSON, or as base64 wrapped in a JSON string literal.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;

use crate::error::CoreError;

/// Return the JSON bytes of a stored payload.
pub fn decode_base64_json(data: &[u8]) -> Result<Vec<u8>, CoreError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut data = data;
    if data[0] == b'"' {
        data = data.trim_ascii();
        while let [b'"', rest @ ..] = data {
            data = rest;
        }
        while let [rest @ .., b'"'] = data {
            data = rest;
        }
    }

    if data.first() == Some(&b'{') {
        return Ok(data.to_vec());
    }

    STANDARD
        .decode(data.trim_ascii())
        .map_err(|e| CoreError::Decode(format!("invalid base64 payload: {}", e)))
}

/// Decode a stored payload into a typed record.
pub fn decode_object<T: DeserializeOwned>(data: &[u8]) -> Result<T, CoreError> {
    let json = decode_base64_json(data)?;
    serde_json::from_slice(&json).map_err(|e| CoreError::Decode(e.to_string()))
}
