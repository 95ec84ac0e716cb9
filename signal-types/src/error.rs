//! Error types for the signaling wire format.

use thiserror::Error;

/// Errors that can occur while decoding or encoding envelopes.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The text was not valid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON value was valid but not an object
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// A required field was absent
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A known field had the wrong JSON type
    #[error("field `{field}` must be a string")]
    InvalidField {
        /// Name of the offending field
        field: &'static str,
    },
}
