//! Error types for docsync core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while manipulating or persisting the hash tree.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Index codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docsync_codec::CodecError),

    /// Remote storage error.
    #[error("storage error: {0}")]
    Storage(#[from] docsync_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document, file or entry does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The requested change would leave the tree in an invalid state.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violated rule.
        message: String,
    },

    /// Blob content (metadata, content descriptor) is malformed.
    #[error("invalid format: {message}")]
    Format {
        /// Description of the format issue.
        message: String,
    },

    /// A stored hash does not match the hash recomputed from its children.
    #[error("integrity check failed: {message}")]
    Integrity {
        /// Description of the mismatch.
        message: String,
    },
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Returns true if this is a not found error, from any layer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound { .. }
                | CoreError::Storage(docsync_storage::StorageError::NotFound { .. })
        )
    }
}
