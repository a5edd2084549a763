//! Fetch errors.

use serde::{Serialize, Serializer};

/// Failure of a remote lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the server answered with an error status.
    #[error("network error: {0}")]
    Network(String),

    /// The response body was not a list of records.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl Serialize for FetchError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
