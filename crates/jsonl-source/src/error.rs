//! Error types for JSONL parsing.

use thiserror::Error;

/// Reasons a single JSONL line can fail to parse into a record.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The line is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The line parsed, but the top-level value is not an object.
    #[error("line is not a JSON object")]
    NotAnObject,

    /// The identifier field is missing from the record.
    #[error("missing identifier field '{0}'")]
    MissingId(String),

    /// The identifier field is present but not an integer.
    #[error("identifier field '{field}' must be an integer, got {value}")]
    NonIntegerId { field: String, value: String },
}
