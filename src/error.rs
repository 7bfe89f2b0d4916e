use std::io;
use thiserror::Error;

/// Custom error type for devpulse
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metric unavailable: {0}")]
    Reader(String),

    #[error("State store error: {0}")]
    Store(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Startup failed: {0}")]
    Startup(String),
}

/// Result type alias for devpulse
pub type Result<T> = std::result::Result<T, PulseError>;

impl PulseError {
    /// Create a reader error (metric could not be measured)
    pub fn reader<S: Into<String>>(msg: S) -> Self {
        PulseError::Reader(msg.into())
    }

    pub fn store<S: Into<String>>(msg: S) -> Self {
        PulseError::Store(msg.into())
    }

    pub fn notification<S: Into<String>>(msg: S) -> Self {
        PulseError::Notification(msg.into())
    }

    pub fn startup<S: Into<String>>(msg: S) -> Self {
        PulseError::Startup(msg.into())
    }
}
