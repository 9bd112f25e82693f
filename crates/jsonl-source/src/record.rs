//! Per-line record parsing.

use crate::error::ParseError;
use serde_json::{Map, Value};

/// A single parsed JSONL record.
///
/// The record is opaque beyond its identifier field: `fields` carries the
/// full JSON object as written in the dataset file, including the identifier
/// itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Value of the identifier field, the natural key for idempotent import.
    pub id: i64,
    /// The complete record object.
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Parse one JSONL line into a record.
    ///
    /// The line must be a JSON object carrying an integer under `id_field`.
    pub fn parse(line: &str, id_field: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(line)?;
        let Value::Object(fields) = value else {
            return Err(ParseError::NotAnObject);
        };

        let id = match fields.get(id_field) {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| ParseError::NonIntegerId {
                field: id_field.to_string(),
                value: n.to_string(),
            })?,
            Some(other) => {
                return Err(ParseError::NonIntegerId {
                    field: id_field.to_string(),
                    value: other.to_string(),
                })
            }
            None => return Err(ParseError::MissingId(id_field.to_string())),
        };

        Ok(Self { id, fields })
    }
}
