//! Local-directory remote storage.
//!
//! Layout:
//!
//! ```text
//! <dir>/
//! ├─ blobs/<hash>      # Immutable content-addressed blobs
//! ├─ root.json         # {"hash": ..., "generation": ...}
//! ├─ sync-complete     # Last acknowledged generation
//! └─ LOCK              # Advisory lock serializing root updates
//! ```
//!
//! Used as the test double for the HTTP service and for syncing through a
//! shared directory. Several processes may share one directory: root updates
//! take an exclusive file lock, so at most one compare-and-swap wins per
//! generation.

use crate::error::{StorageError, StorageResult};
use crate::remote::{RemoteStorage, RootPointer};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const BLOBS_DIR: &str = "blobs";
const ROOT_FILE: &str = "root.json";
const ROOT_TEMP: &str = "root.json.tmp";
const SYNC_COMPLETE_FILE: &str = "sync-complete";
const LOCK_FILE: &str = "LOCK";

/// A [`RemoteStorage`] backed by a local directory.
///
/// # Example
///
/// ```no_run
/// use docsync_storage::{LocalDirectoryStorage, RemoteStorage};
/// use std::path::Path;
///
/// let storage = LocalDirectoryStorage::open(Path::new("remote")).unwrap();
/// storage.put_blob("abcd", b"hello").unwrap();
/// let generation = storage.cas_root("abcd", 0).unwrap();
/// assert_eq!(generation, 1);
/// ```
#[derive(Debug)]
pub struct LocalDirectoryStorage {
    path: PathBuf,
    root_lock: Mutex<()>,
}

impl LocalDirectoryStorage {
    /// Opens a storage directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path.join(BLOBS_DIR))?;
        Ok(Self {
            path: path.to_path_buf(),
            root_lock: Mutex::new(()),
        })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a blob with this hash is stored.
    pub fn contains(&self, hash: &str) -> bool {
        blob_name_ok(hash) && self.blob_path(hash).is_file()
    }

    /// Returns the last generation acknowledged through `sync_complete`.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker file cannot be read.
    pub fn last_sync_complete(&self) -> StorageResult<Option<u64>> {
        match fs::read_to_string(self.path.join(SYNC_COMPLETE_FILE)) {
            Ok(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| StorageError::protocol("corrupt sync-complete marker")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.path.join(BLOBS_DIR).join(hash)
    }

    fn read_root(&self) -> StorageResult<RootPointer> {
        match fs::read(self.path.join(ROOT_FILE)) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| StorageError::protocol(format!("corrupt root pointer: {e}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RootPointer::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_root(&self, root: &RootPointer) -> StorageResult<()> {
        let data = serde_json::to_vec(root)
            .map_err(|e| StorageError::protocol(format!("cannot encode root pointer: {e}")))?;
        let temp = self.path.join(ROOT_TEMP);
        let mut file = File::create(&temp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, self.path.join(ROOT_FILE))?;
        Ok(())
    }

    /// Runs `f` while holding both the in-process and the cross-process lock.
    fn with_root_lock<T>(&self, f: impl FnOnce() -> StorageResult<T>) -> StorageResult<T> {
        let _guard = self.root_lock.lock();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.join(LOCK_FILE))?;
        FileExt::lock_exclusive(&lock_file)?;
        let result = f();
        let _ = FileExt::unlock(&lock_file);
        result
    }
}

/// Blob names are hashes; anything else could escape the blob directory.
fn blob_name_ok(hash: &str) -> bool {
    !hash.is_empty() && hash.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl RemoteStorage for LocalDirectoryStorage {
    fn get_root(&self) -> StorageResult<RootPointer> {
        self.read_root()
    }

    fn get_reader(&self, hash: &str) -> StorageResult<Box<dyn Read + Send>> {
        if !blob_name_ok(hash) {
            return Err(StorageError::not_found(hash));
        }
        match File::open(self.blob_path(hash)) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::not_found(hash)),
            Err(e) => Err(e.into()),
        }
    }

    fn put_blob(&self, hash: &str, content: &[u8]) -> StorageResult<()> {
        if !blob_name_ok(hash) {
            return Err(StorageError::protocol(format!("invalid blob name {hash:?}")));
        }
        let path = self.blob_path(hash);
        if path.is_file() {
            debug!(hash, "blob already present");
            return Ok(());
        }

        let temp = self.path.join(BLOBS_DIR).join(format!("{hash}.tmp"));
        let mut file = File::create(&temp)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, &path)?;
        debug!(hash, size = content.len(), "stored blob");
        Ok(())
    }

    fn cas_root(&self, hash: &str, expected_generation: u64) -> StorageResult<u64> {
        self.with_root_lock(|| {
            let current = self.read_root()?;
            if current.generation != expected_generation {
                return Err(StorageError::WrongGeneration {
                    expected: expected_generation,
                });
            }
            let next = RootPointer::new(hash, current.generation + 1);
            self.write_root(&next)?;
            debug!(hash, generation = next.generation, "root updated");
            Ok(next.generation)
        })
    }

    fn sync_complete(&self, generation: u64) -> StorageResult<()> {
        self.with_root_lock(|| {
            let current = self.read_root()?;
            if current.generation > generation {
                return Err(StorageError::Conflict { generation });
            }
            fs::write(self.path.join(SYNC_COMPLETE_FILE), generation.to_string())?;
            Ok(())
        })
    }
}
