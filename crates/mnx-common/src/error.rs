//! Error types for MNX

use thiserror::Error;

/// Result type alias for MNX operations
pub type Result<T> = std::result::Result<T, MnxError>;

/// Main error type for MNX
#[derive(Error, Debug)]
pub enum MnxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown timezone: {0}")]
    Timezone(String),

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },
}

impl MnxError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timestamp error
    pub fn timestamp(value: impl Into<String>, reason: impl ToString) -> Self {
        Self::Timestamp {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
