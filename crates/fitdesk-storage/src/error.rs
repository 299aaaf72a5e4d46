//! Error types for the credential store

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for storage writes
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage writes
///
/// Reads never fail: a missing or malformed value reads as absent.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error while writing the backing file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Value could not be encoded as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The replacement file could not be moved into place
    #[error("Failed to persist {path}: {message}")]
    Persist {
        /// Destination path
        path: PathBuf,
        /// Error message
        message: String,
    },
}

impl StorageError {
    /// Create a persist error
    pub fn persist(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persist {
            path: path.into(),
            message: message.into(),
        }
    }
}
