//! Temporary remotes and cache locations.

use docsync_core::{Document, HashTree};
use docsync_storage::{LocalDirectoryStorage, RemoteStorage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A local-directory remote in a temporary directory.
pub struct TestRemote {
    storage: LocalDirectoryStorage,
    _temp_dir: TempDir,
}

impl TestRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage =
            LocalDirectoryStorage::open(temp_dir.path()).expect("Failed to open remote directory");
        Self {
            storage,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the remote storage.
    pub fn storage(&self) -> &LocalDirectoryStorage {
        &self.storage
    }

    /// Returns the remote directory.
    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    /// Opens a second handle on the same directory, as another process
    /// would.
    pub fn reopen(&self) -> LocalDirectoryStorage {
        LocalDirectoryStorage::open(self.path()).expect("Failed to reopen remote directory")
    }

    /// Uploads every blob of `tree` and points the remote root at it.
    /// Returns the new generation.
    pub fn publish(&self, tree: &HashTree) -> u64 {
        for doc in tree.documents() {
            self.publish_document(doc);
        }
        self.storage
            .put_blob(tree.root_hash(), &tree.index_blob())
            .expect("Failed to upload root index");
        let current = self.storage.get_root().expect("Failed to read root");
        self.storage
            .cas_root(tree.root_hash(), current.generation)
            .expect("Failed to swap root")
    }

    /// Uploads the staged blobs and index of one document.
    pub fn publish_document(&self, doc: &Document) {
        for (hash, bytes) in doc.staged_blobs() {
            self.storage
                .put_blob(hash, bytes)
                .expect("Failed to upload blob");
        }
        self.storage
            .put_blob(doc.hash(), &doc.index_blob())
            .expect("Failed to upload document index");
    }
}

impl Default for TestRemote {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary directory for local cache files.
pub struct TestCache {
    temp_dir: TempDir,
}

impl TestCache {
    /// Creates an empty cache directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns a cache file path for the client called `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name).join("tree.json")
    }
}

impl Default for TestCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a tree of collections, `(id, parent)` pairs, all staged.
pub fn folder_tree(folders: &[(&str, &str)]) -> HashTree {
    let mut tree = HashTree::new();
    for (id, parent) in folders {
        let doc = Document::new_collection(*id, id.to_uppercase(), *parent)
            .expect("Failed to build collection");
        tree.add(doc).expect("Failed to add collection");
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_advances_generation() {
        let remote = TestRemote::new();
        let tree = folder_tree(&[("a", ""), ("b", "a")]);
        assert_eq!(remote.publish(&tree), 1);
        assert_eq!(remote.publish(&tree), 2);

        let root = remote.reopen().get_root().unwrap();
        assert_eq!(root.hash, tree.root_hash());
    }

    #[test]
    fn cache_paths_are_per_client() {
        let cache = TestCache::new();
        assert_ne!(cache.path("a"), cache.path("b"));
    }
}
