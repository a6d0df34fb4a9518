//! Error types for the store contract

/// Result type alias using the store Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in document store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document does not exist (update on a missing document)
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Payload is not usable as a document (e.g. merge with a non-object)
    #[error("Invalid document payload: {0}")]
    InvalidPayload(String),

    /// Backend rejected or lost the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a later periodic write can be expected to recover from this
    /// failure (heartbeats and sync ticks re-write the same documents).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }
}
