//! Error types for message decoding.

use thiserror::Error;

/// Errors that can occur when decoding a delivery body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body is not well-formed JSON or does not have the expected shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The timestamp field is present but does not match the reference format.
    #[error("invalid timestamp '{value}': expected YYYY-MM-DD.hh:mm:ss")]
    InvalidTimestamp { value: String },

    /// A required field decoded to an empty string.
    #[error("required field '{field}' is empty")]
    EmptyField { field: &'static str },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}
