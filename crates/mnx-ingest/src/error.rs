//! Error types for synchronization and table processing

use std::path::PathBuf;
use thiserror::Error;

/// Result type for synchronization operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised while synchronizing remote files
///
/// Systemic errors (see [`SyncError::is_systemic`]) come from setting up the
/// batch rather than from one file. They abort the run only when every file
/// of the batch hit one; otherwise, like every other variant, they are
/// contained to the file they occurred for.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to connect to '{host}': {reason}")]
    Connect { host: String, reason: String },

    #[error("Remote directory '{path}' is not accessible: {reason}")]
    RemoteDirectory { path: String, reason: String },

    #[error("Local directory '{}' does not exist", .0.display())]
    LocalDirectory(PathBuf),

    #[error("Invalid filename '{0}'")]
    InvalidFilename(String),

    #[error("Failed to query '{filename}': {reason}")]
    Stat { filename: String, reason: String },

    #[error("'{0}' is not a regular file")]
    NotAFile(String),

    #[error("Invalid modification time {value} for '{filename}': {reason}")]
    Timestamp {
        filename: String,
        value: String,
        reason: String,
    },

    #[error("Transfer of '{filename}' failed: {source}")]
    Transfer {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not all bytes were transferred for '{filename}': expected {expected}, received {actual}")]
    Integrity {
        filename: String,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to write '{}': {source}", .path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Whether the error comes from reaching the server, its release
    /// directory or the local directory rather than from the file itself
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            SyncError::Connect { .. } | SyncError::RemoteDirectory { .. } | SyncError::LocalDirectory(_)
        )
    }

    pub(crate) fn local_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::LocalWrite {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while reading, transforming or writing tables
#[derive(Debug, Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("The table is empty")]
    Empty,
}
