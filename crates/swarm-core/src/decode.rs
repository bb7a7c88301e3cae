//! Decoding of `docker --format '{{json .}}'` output.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Command output did not have the expected JSON shape.
#[derive(Debug, Error)]
#[error("malformed {what} output")]
pub struct DecodeError {
    pub what: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Decode a single JSON object.
pub fn decode_json<T: DeserializeOwned>(what: &'static str, output: &str) -> Result<T, DecodeError> {
    serde_json::from_str(output.trim()).map_err(|source| DecodeError { what, source })
}

/// Decode one JSON value per line. Blank output decodes to an empty list.
pub fn decode_json_lines<T: DeserializeOwned>(
    what: &'static str,
    output: &str,
) -> Result<Vec<T>, DecodeError> {
    serde_json::Deserializer::from_str(output)
        .into_iter::<T>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| DecodeError { what, source })
}
