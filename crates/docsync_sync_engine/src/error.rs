//! Error types for the sync engine.

use docsync_codec::CodecError;
use docsync_core::CoreError;
use docsync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during mirror and commit.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Error from the local data model, including rejected mutations.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the remote storage.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Corrupt index blob.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The commit lost the generation race on every attempt.
    #[error("repeated optimistic-concurrency failures after {attempts} attempts")]
    Conflict {
        /// Number of attempts made.
        attempts: u32,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if retries were exhausted.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }

    /// Returns true if the failure is transient and the whole operation may
    /// be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Storage(e) | SyncError::Core(CoreError::Storage(e)) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if something was not found, at any layer.
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::Core(e) => e.is_not_found(),
            SyncError::Storage(StorageError::NotFound { .. }) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(SyncError::Conflict { attempts: 10 }.is_conflict());
        assert!(!SyncError::config("bad").is_conflict());

        let network = SyncError::from(StorageError::network("reset"));
        assert!(network.is_retryable());
        let nested = SyncError::from(CoreError::from(StorageError::network("reset")));
        assert!(nested.is_retryable());
        assert!(!SyncError::from(CoreError::validation("no")).is_retryable());

        assert!(SyncError::from(CoreError::not_found("x")).is_not_found());
        assert!(SyncError::from(StorageError::not_found("ab")).is_not_found());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Conflict { attempts: 10 };
        assert!(err.to_string().contains("10 attempts"));

        let err = SyncError::from(CoreError::validation("no files"));
        assert_eq!(err.to_string(), "validation failed: no files");
    }
}
