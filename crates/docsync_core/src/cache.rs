//! Local cache of the hash tree.
//!
//! The cache is a single JSON file holding the last committed or mirrored
//! tree. A cache that is missing, unreadable, stamped with another
//! [`CACHE_VERSION`] or internally inconsistent is discarded: the engine
//! starts from an empty tree and the next mirror rebuilds it.

use crate::error::{CoreError, CoreResult};
use crate::tree::{HashTree, CACHE_VERSION};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "DOCSYNC_CACHE_DIR";

/// Name of the cache file inside the cache directory.
pub const CACHE_FILE: &str = "tree.json";

/// Reads and writes the cached [`HashTree`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Creates a store for the cache file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolves the cache file path: `explicit` if given, then the
    /// `DOCSYNC_CACHE_DIR` directory, then the platform cache directory.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no platform cache directory can be determined.
    pub fn resolve_path(explicit: Option<PathBuf>) -> CoreResult<PathBuf> {
        if let Some(path) = explicit {
            if !path.as_os_str().is_empty() {
                return Ok(path);
            }
        }
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir).join(CACHE_FILE));
            }
        }
        Self::default_path()
    }

    /// Returns the cache file path in the platform cache directory.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the platform has no cache directory.
    pub fn default_path() -> CoreResult<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "docsync")
            .ok_or_else(|| CoreError::not_found("platform cache directory"))?;
        Ok(dirs.cache_dir().join(CACHE_FILE))
    }

    /// Returns the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached tree, or an empty tree if the cache is unusable.
    pub fn load(&self) -> HashTree {
        match self.try_load() {
            Ok(Some(tree)) => {
                debug!(
                    path = %self.path.display(),
                    documents = tree.len(),
                    generation = tree.generation(),
                    "loaded cache"
                );
                tree
            }
            Ok(None) => HashTree::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding local cache");
                HashTree::new()
            }
        }
    }

    fn try_load(&self) -> CoreResult<Option<HashTree>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tree: HashTree = serde_json::from_slice(&data)
            .map_err(|e| CoreError::format(format!("unreadable cache: {e}")))?;
        if tree.cache_version() != CACHE_VERSION {
            return Err(CoreError::format(format!(
                "cache version {} (expected {CACHE_VERSION})",
                tree.cache_version()
            )));
        }
        tree.verify()?;
        Ok(Some(tree))
    }

    /// Writes the tree, stamped with the current cache version.
    ///
    /// The file is replaced atomically: written to a temporary file, synced,
    /// then renamed over the cache.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the cache cannot be written.
    pub fn save(&self, tree: &HashTree) -> CoreResult<()> {
        let mut tree = tree.clone();
        tree.stamp_cache_version();
        let data = serde_json::to_vec(&tree)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let mut file = File::create(&temp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, &self.path)?;

        debug!(
            path = %self.path.display(),
            generation = tree.generation(),
            "saved cache"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use tempfile::tempdir;

    fn sample_tree() -> HashTree {
        let mut tree = HashTree::new();
        tree.add(Document::new_collection("a", "Books", "").unwrap())
            .unwrap();
        tree.add(Document::new_document("b", "Paper", "a", "pdf", b"%PDF".to_vec()).unwrap())
            .unwrap();
        tree.accept_generation(7);
        tree
    }

    #[test]
    fn missing_cache_is_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("tree.json"));
        let tree = store.load();
        assert!(tree.is_empty());
        assert_eq!(tree.generation(), 0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested").join("tree.json"));
        let tree = sample_tree();
        store.save(&tree).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, tree);
        assert_eq!(loaded.generation(), 7);
        assert_eq!(loaded.root_hash(), tree.root_hash());
    }

    #[test]
    fn dirty_flag_survives_reload() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("tree.json"));
        let mut tree = sample_tree();
        tree.find_document_mut("a").unwrap().rename("Library");
        store.save(&tree).unwrap();

        let loaded = store.load();
        assert!(loaded.find_document("a").unwrap().metadata.dirty);
    }

    #[test]
    fn corrupt_cache_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(CacheStore::new(&path).load().is_empty());
    }

    #[test]
    fn version_mismatch_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree.json");
        let store = CacheStore::new(&path);
        store.save(&sample_tree()).unwrap();

        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["cache_version"] = serde_json::json!(CACHE_VERSION + 1);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(store.load().is_empty());
    }

    #[test]
    fn tampered_hash_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree.json");
        let store = CacheStore::new(&path);
        store.save(&sample_tree()).unwrap();

        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["root_hash"] = serde_json::json!("00".repeat(32));
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(store.load().is_empty());
    }

    #[test]
    fn save_failure_propagates() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        // The parent "directory" is a regular file.
        let store = CacheStore::new(blocker.join("tree.json"));
        assert!(matches!(
            store.save(&sample_tree()),
            Err(CoreError::Io(_))
        ));
    }

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/tmp/explicit/tree.json");
        assert_eq!(
            CacheStore::resolve_path(Some(path.clone())).unwrap(),
            path
        );
    }
}
