// Error types for the live feeds

use thiserror::Error;

/// Result type alias for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors that can occur while setting up or running a feed
///
/// Only `Configuration` is fatal: it is returned at construction time. Transport and
/// decode failures are reported through the feed's state and diagnostics instead of
/// being propagated past the feed boundary.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Invalid source descriptor or feed settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or protocol failure on the push transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed inbound frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// The feed task has already shut down
    #[error("Feed closed")]
    Closed,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FeedError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        FeedError::Configuration(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        FeedError::Transport(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        FeedError::Decode(msg.into())
    }

    /// Whether the error should abort setup rather than degrade the feed
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::Configuration(_))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Decode(err.to_string())
    }
}
