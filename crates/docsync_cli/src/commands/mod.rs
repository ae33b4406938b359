//! CLI command implementations.

pub mod edit;
pub mod list;
pub mod sync;

use docsync_storage::LocalDirectoryStorage;
use docsync_sync_engine::{SyncClient, SyncConfig, SyncError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Client type every command runs against.
pub type Client = SyncClient<LocalDirectoryStorage>;

/// Errors raised by the CLI itself, before the engine is involved.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--remote` was given.
    #[error("remote directory required (--remote)")]
    MissingRemote,

    /// The upload has no usable extension.
    #[error("cannot upload {path:?}: expected a .pdf or .epub file")]
    UnsupportedFile {
        /// Offending path.
        path: PathBuf,
    },

    /// Unknown `--format` value.
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
}

/// Opens a client on the remote directory, with environment overrides and
/// an optional explicit cache file.
pub fn open_client(remote: &Path, cache: Option<PathBuf>) -> Result<Client, SyncError> {
    let mut config = SyncConfig::from_env()?;
    if let Some(cache) = cache {
        config = config.with_cache_path(cache);
    }
    let storage = LocalDirectoryStorage::open(remote)?;
    SyncClient::open(storage, config)
}
