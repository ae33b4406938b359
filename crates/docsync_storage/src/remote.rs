//! Remote storage trait definition.

use crate::error::StorageResult;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// The remote root pointer: which root index is current, at which generation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RootPointer {
    /// Hash of the current root index blob. Empty if the remote was never
    /// written.
    pub hash: String,
    /// Remote-assigned, monotonically increasing generation counter.
    pub generation: u64,
}

impl RootPointer {
    /// Creates a root pointer.
    pub fn new(hash: impl Into<String>, generation: u64) -> Self {
        Self {
            hash: hash.into(),
            generation,
        }
    }

    /// Returns true if the remote has never had a root written.
    pub fn is_unset(&self) -> bool {
        self.hash.is_empty()
    }
}

/// A content-addressed remote blob store with a single versioned root.
///
/// Blobs are immutable and named by the hash of their content. The root
/// pointer is the only mutable state and is updated with compare-and-swap on
/// its generation.
///
/// # Invariants
///
/// - `get_reader(h)` returns exactly the bytes previously stored under `h`
/// - `put_blob` is idempotent for the same hash and content
/// - at most one `cas_root` succeeds per generation; every other caller that
///   based its update on that generation observes `WrongGeneration`
/// - generations returned by `cas_root` strictly increase
///
/// # Implementors
///
/// - [`super::LocalDirectoryStorage`] - blobs in a local directory
/// - [`super::HttpBlobStorage`] - the HTTP blob service
pub trait RemoteStorage: Send + Sync {
    /// Returns the current root pointer.
    ///
    /// # Errors
    ///
    /// Returns `Network` or `Auth` errors from the transport.
    fn get_root(&self) -> StorageResult<RootPointer>;

    /// Opens a reader over the blob stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no blob with that hash exists remotely.
    fn get_reader(&self, hash: &str) -> StorageResult<Box<dyn Read + Send>>;

    /// Stores `content` under `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    fn put_blob(&self, hash: &str, content: &[u8]) -> StorageResult<()>;

    /// Points the root at `hash` if the remote is still at
    /// `expected_generation`, and returns the new generation.
    ///
    /// # Errors
    ///
    /// Returns `WrongGeneration` if `expected_generation` is stale.
    fn cas_root(&self, hash: &str, expected_generation: u64) -> StorageResult<u64>;

    /// Notifies the remote that a sync at `generation` is complete.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a newer generation already exists. Callers treat
    /// that case as success.
    fn sync_complete(&self, generation: u64) -> StorageResult<()>;

    /// Reads the whole blob stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the blob is missing, or an I/O error while
    /// reading.
    fn get_blob(&self, hash: &str) -> StorageResult<Vec<u8>> {
        let mut reader = self.get_reader(hash)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<S: RemoteStorage + ?Sized> RemoteStorage for &S {
    fn get_root(&self) -> StorageResult<RootPointer> {
        (**self).get_root()
    }

    fn get_reader(&self, hash: &str) -> StorageResult<Box<dyn Read + Send>> {
        (**self).get_reader(hash)
    }

    fn put_blob(&self, hash: &str, content: &[u8]) -> StorageResult<()> {
        (**self).put_blob(hash, content)
    }

    fn cas_root(&self, hash: &str, expected_generation: u64) -> StorageResult<u64> {
        (**self).cas_root(hash, expected_generation)
    }

    fn sync_complete(&self, generation: u64) -> StorageResult<()> {
        (**self).sync_complete(generation)
    }

    fn get_blob(&self, hash: &str) -> StorageResult<Vec<u8>> {
        (**self).get_blob(hash)
    }
}

impl<S: RemoteStorage + ?Sized> RemoteStorage for std::sync::Arc<S> {
    fn get_root(&self) -> StorageResult<RootPointer> {
        (**self).get_root()
    }

    fn get_reader(&self, hash: &str) -> StorageResult<Box<dyn Read + Send>> {
        (**self).get_reader(hash)
    }

    fn put_blob(&self, hash: &str, content: &[u8]) -> StorageResult<()> {
        (**self).put_blob(hash, content)
    }

    fn cas_root(&self, hash: &str, expected_generation: u64) -> StorageResult<u64> {
        (**self).cas_root(hash, expected_generation)
    }

    fn sync_complete(&self, generation: u64) -> StorageResult<()> {
        (**self).sync_complete(generation)
    }

    fn get_blob(&self, hash: &str) -> StorageResult<Vec<u8>> {
        (**self).get_blob(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_root() {
        assert!(RootPointer::default().is_unset());
        assert!(!RootPointer::new("abcd", 1).is_unset());
    }
}
