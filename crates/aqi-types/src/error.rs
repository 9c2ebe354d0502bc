//! Error types for response parsing in aqi-types.

use thiserror::Error;

/// Errors that can occur when turning an API response into a batch.
///
/// Value-level problems (a malformed timestamp, a non-numeric reading) are
/// never errors; they become nulls in the typed [`Reading`](crate::Reading).
/// Only a response whose overall shape is wrong ends up here.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The response body was valid JSON but not an object.
    #[error("Expected a JSON object at the top level, found {0}")]
    NotAnObject(&'static str),

    /// An element of the `records` array was not a JSON object.
    #[error("Record {index} is not a JSON object (found {found})")]
    RecordNotObject { index: usize, found: &'static str },
}

/// Result type alias using aqi-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Name of a JSON value's kind, for error messages.
pub(crate) fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
