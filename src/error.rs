//! Centralized error types for replytrack.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the replytrack library.
#[derive(Error, Debug)]
pub enum TrackError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The file does not appear to be a valid MBOX.
    #[error("File does not appear to be a valid MBOX: {0}")]
    InvalidMbox(PathBuf),

    /// A JSON document on disk could not be read or written.
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The mailbox search collaborator failed.
    #[error("Search failed for '{query}': {reason}")]
    Search { query: String, reason: String },

    /// A message could not be read or updated.
    #[error("Message access failed for {id}: {reason}")]
    MessageAccess { id: String, reason: String },

    /// A label could not be created or attached.
    #[error("Label error for '{name}': {reason}")]
    Label { name: String, reason: String },

    /// The tabular store rejected an operation.
    #[error("Sheet error: {0}")]
    Sheet(String),

    /// Configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, TrackError>`.
pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Json` variant from a path and a `serde_json::Error`.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `TrackError::io`).
impl From<std::io::Error> for TrackError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
