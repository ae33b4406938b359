//! Error types for remote storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to the remote blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred in a local backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested blob does not exist remotely.
    #[error("blob not found: {hash}")]
    NotFound {
        /// Hash of the missing blob.
        hash: String,
    },

    /// A root update was attempted against a stale generation.
    #[error("wrong generation: {expected} is no longer current")]
    WrongGeneration {
        /// Generation the caller based its update on.
        expected: u64,
    },

    /// A newer generation already exists (sync-complete notification).
    #[error("generation {generation} is already superseded")]
    Conflict {
        /// Generation the caller tried to acknowledge.
        generation: u64,
    },

    /// Network or transport failure.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Authentication was rejected.
    #[error("authentication failed: {message}")]
    Auth {
        /// Error message.
        message: String,
    },

    /// The remote answered with something this client cannot interpret.
    #[error("protocol error: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },
}

impl StorageError {
    /// Creates a not found error.
    pub fn not_found(hash: impl Into<String>) -> Self {
        Self::NotFound { hash: hash.into() }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns true if this error is a stale-generation rejection.
    pub fn is_wrong_generation(&self) -> bool {
        matches!(self, StorageError::WrongGeneration { .. })
    }

    /// Returns true if the failure is transient and the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(StorageError::network("connection reset").is_retryable());
        assert!(!StorageError::not_found("abc").is_retryable());
        assert!(StorageError::WrongGeneration { expected: 1 }.is_wrong_generation());
        assert!(!StorageError::Conflict { generation: 3 }.is_wrong_generation());
    }

    #[test]
    fn error_display() {
        let err = StorageError::not_found("deadbeef");
        assert_eq!(err.to_string(), "blob not found: deadbeef");

        let err = StorageError::WrongGeneration { expected: 4 };
        assert!(err.to_string().contains('4'));
    }
}
