//! Unified error types for SubTrack.

use thiserror::Error;

/// Result type alias using SubtrackError.
pub type Result<T> = std::result::Result<T, SubtrackError>;

#[derive(Error, Debug)]
pub enum SubtrackError {
    // Persistence errors — abort one renewal, rolled back, retried next tick
    #[error("Store error: {0}")]
    Store(String),

    #[error("Subscription not found: {0}")]
    NotFound(i64),

    // Notification errors — logged and dropped, no retry within a tick
    #[error("Notify error: {0}")]
    Notify(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SubtrackError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
