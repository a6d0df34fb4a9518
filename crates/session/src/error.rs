//! Error types for the coordination engines

/// Result type alias using the session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in room coordination operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Room does not exist or has been ended by the host
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Operation is reserved for the room's host
    #[error("Operation requires the room host: {0}")]
    NotHost(String),

    /// Local audio capture was denied or is unavailable
    #[error("Media access failed: {0}")]
    MediaAccess(String),

    /// Signaling record was malformed or in a conflicting state
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Peer link operation failed
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// Playback widget operation failed
    #[error("Player error: {0}")]
    Player(String),

    /// Video link could not be parsed into a video id
    #[error("Invalid video link: {0}")]
    InvalidVideoLink(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] watchparty_store::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether this failure sits on a periodic path that naturally recovers
    /// (heartbeats, sync ticks, candidate writes).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store(inner) if inner.is_transient())
    }

    /// Whether this failure must surface as a "not connected" voice state
    /// rather than tearing anything down.
    pub fn is_media_error(&self) -> bool {
        matches!(self, Error::MediaAccess(_))
    }

    /// Whether this failure terminates the room view
    pub fn is_room_fatal(&self) -> bool {
        matches!(self, Error::RoomNotFound(_))
    }
}
