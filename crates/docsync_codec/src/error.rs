//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or hashing an index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The index content does not follow the canonical format.
    #[error("index format error: {message}")]
    Format {
        /// Description of the format error.
        message: String,
    },
}

impl CodecError {
    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a format error for a hash that is not hex.
    pub fn invalid_hash(hash: &str, reason: &str) -> Self {
        Self::format(format!("invalid hash {hash:?}: {reason}"))
    }
}
