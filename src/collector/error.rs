//! Errors shared by collectors and publishers of every backend.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while collecting or publishing configuration data.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend holds nothing for the requested prefix or key.
    #[error("a configuration data not found in {origin}")]
    Empty { origin: String },

    /// A single-key query matched more than one entry.
    #[error("too many responses ({count}) for {origin}")]
    TooMany { origin: String, count: usize },

    /// The optimistic-concurrency condition of a key-scoped publish failed.
    #[error("failed to publish {key}: wrong revision, expected {revision}")]
    WrongRevision { key: String, revision: i64 },

    /// The target does not support conditional publishing.
    #[error("publishing with a revision is not supported for {target}")]
    RevisionUnsupported { target: String },

    /// The backend has no integrity support.
    #[error("integrity checks are not supported for the {backend} backend")]
    IntegrityUnsupported { backend: &'static str },

    /// A call or an overall deadline expired.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// The backend client failed.
    #[error("failed to {operation} {target}: {message}")]
    Backend {
        operation: String,
        target: String,
        message: String,
    },

    /// The backend answered with an unexpected structure.
    #[error("unexpected {operation} response: {message}")]
    Response { operation: String, message: String },

    /// Local file access failed.
    #[error("unable to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes are not a valid document.
    #[error("failed to decode {origin}: {message}")]
    Decode { origin: String, message: String },

    /// A stored value failed its integrity check.
    #[error("integrity check failed for {key}: {message}")]
    Integrity { key: String, message: String },

    /// Signing a value before publishing failed.
    #[error("failed to sign data: {message}")]
    Sign { message: String },
}

impl StorageError {
    pub fn is_empty(&self) -> bool {
        matches!(self, StorageError::Empty { .. })
    }

    pub fn is_wrong_revision(&self) -> bool {
        matches!(self, StorageError::WrongRevision { .. })
    }
}

/// Result type for collect and publish operations.
pub type StorageResult<T> = Result<T, StorageError>;
