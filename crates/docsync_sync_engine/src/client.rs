//! The sync client: a cached tree bound to a remote.

use crate::commit::{CommitProtocol, CommitReport};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::mirror::{Mirror, MirrorReport};
use docsync_core::{
    new_document_id, CacheStore, CoreError, CoreResult, Document, HashTree, ROOT_PARENT,
    TRASH_PARENT,
};
use docsync_storage::RemoteStorage;
use tracing::info;

/// Owns the local tree of one remote and runs every operation on it.
///
/// Mutating operations go through the commit protocol: they run on the
/// current remote state, are uploaded and swapped in as one unit, and are
/// replayed when another client commits in between.
///
/// # Example
///
/// ```rust
/// use docsync_storage::LocalDirectoryStorage;
/// use docsync_sync_engine::{SyncClient, SyncConfig};
///
/// let remote = tempfile::tempdir().unwrap();
/// let local = tempfile::tempdir().unwrap();
/// let storage = LocalDirectoryStorage::open(remote.path()).unwrap();
/// let config = SyncConfig::new().with_cache_path(local.path().join("tree.json"));
///
/// let mut client = SyncClient::open(storage, config).unwrap();
/// let folder = client.create_folder("Books", "").unwrap();
/// assert_eq!(client.list(&folder).len(), 0);
/// assert_eq!(client.list("").len(), 1);
/// ```
pub struct SyncClient<S: RemoteStorage> {
    storage: S,
    config: SyncConfig,
    cache: CacheStore,
    tree: HashTree,
}

impl<S: RemoteStorage> SyncClient<S> {
    /// Opens a client, loading the cached tree.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache location can be resolved.
    pub fn open(storage: S, config: SyncConfig) -> SyncResult<Self> {
        let cache = CacheStore::new(CacheStore::resolve_path(config.cache_path.clone())?);
        let tree = cache.load();
        Ok(Self {
            storage,
            config,
            cache,
            tree,
        })
    }

    /// Returns the local tree.
    pub fn tree(&self) -> &HashTree {
        &self.tree
    }

    /// Returns the remote storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the cache store.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Pulls the remote state and saves it to the cache when anything,
    /// the generation included, changed.
    ///
    /// # Errors
    ///
    /// Returns fetch errors, or an I/O error if the cache cannot be saved.
    pub fn mirror(&mut self) -> SyncResult<MirrorReport> {
        let generation = self.tree.generation();
        let report = Mirror::from_config(&self.config).run(&mut self.tree, &self.storage)?;
        if !report.up_to_date || self.tree.generation() != generation {
            self.cache.save(&self.tree)?;
        }
        Ok(report)
    }

    /// Commits an arbitrary mutation.
    ///
    /// The closure may run several times, once per attempt, each time on
    /// the freshest remote state.
    ///
    /// # Errors
    ///
    /// See [`CommitProtocol::run`].
    pub fn commit<F>(&mut self, mutate: F) -> SyncResult<CommitReport>
    where
        F: FnMut(&mut HashTree) -> CoreResult<()>,
    {
        CommitProtocol::new(&self.storage, &self.cache, &self.config).run(&mut self.tree, mutate)
    }

    /// Creates a folder and returns its id.
    ///
    /// The folder is built once; every commit attempt adds the same blobs.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `parent` is not a usable parent.
    pub fn create_folder(&mut self, name: &str, parent: &str) -> SyncResult<String> {
        let id = new_document_id();
        let folder = Document::new_collection(id.as_str(), name, parent)?;
        self.commit(|tree| {
            validate_parent(tree, parent)?;
            tree.add(folder.clone())
        })?;
        info!(%id, name, "created folder");
        Ok(id)
    }

    /// Uploads a document and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `parent` is not a usable parent or `ext` is
    /// not a plain extension.
    pub fn upload_document(
        &mut self,
        name: &str,
        parent: &str,
        ext: &str,
        payload: &[u8],
    ) -> SyncResult<String> {
        let id = new_document_id();
        let doc = Document::new_document(id.as_str(), name, parent, ext, payload.to_vec())?;
        self.commit(|tree| {
            validate_parent(tree, parent)?;
            tree.add(doc.clone())
        })?;
        info!(%id, name, ext, size = payload.len(), "uploaded document");
        Ok(id)
    }

    /// Renames a document.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the document does not exist.
    pub fn rename(&mut self, id: &str, name: &str) -> SyncResult<CommitReport> {
        self.commit(|tree| {
            tree.find_document_mut(id)?.rename(name);
            Ok(())
        })
    }

    /// Moves a document under another parent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the document does not exist and `Validation`
    /// if the parent is unusable or would create a cycle.
    pub fn move_to(&mut self, id: &str, parent: &str) -> SyncResult<CommitReport> {
        self.commit(|tree| {
            validate_parent(tree, parent)?;
            let doc = tree.find_document(id)?;
            if doc.is_collection() && (parent == id || tree.descendants(id).contains(parent)) {
                return Err(CoreError::validation(format!(
                    "cannot move {id} into its own subtree"
                )));
            }
            tree.find_document_mut(id)?.move_to(parent);
            Ok(())
        })
    }

    /// Soft-deletes a document: it stays in the index with its deleted flag
    /// set and disappears from listings.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the document does not exist.
    pub fn delete(&mut self, id: &str) -> SyncResult<CommitReport> {
        self.commit(|tree| {
            tree.find_document_mut(id)?.mark_deleted();
            Ok(())
        })
    }

    /// Removes soft-deleted documents and everything below them from the
    /// index. Returns the removed ids.
    ///
    /// # Errors
    ///
    /// Returns commit errors.
    pub fn purge_deleted(&mut self) -> SyncResult<Vec<String>> {
        let mut purged = Vec::new();
        self.commit(|tree| {
            let mut doomed = std::collections::BTreeSet::new();
            for doc in tree.documents().iter().filter(|d| d.is_deleted()) {
                doomed.insert(doc.id().to_string());
                doomed.extend(tree.descendants(doc.id()));
            }
            for id in &doomed {
                tree.remove(id)?;
            }
            purged = doomed.into_iter().collect();
            Ok(())
        })?;
        info!(count = purged.len(), "purged deleted documents");
        Ok(purged)
    }

    /// Lists the live documents directly under `parent`.
    pub fn list(&self, parent: &str) -> Vec<&Document> {
        self.tree
            .live_documents()
            .filter(|doc| doc.metadata.parent_id == parent)
            .collect()
    }
}

/// A parent is the root, the trash, or a live collection.
fn validate_parent(tree: &HashTree, parent: &str) -> CoreResult<()> {
    if parent == ROOT_PARENT || parent == TRASH_PARENT {
        return Ok(());
    }
    match tree.find_document(parent) {
        Ok(doc) if doc.is_collection() && !doc.is_deleted() => Ok(()),
        Ok(_) => Err(CoreError::validation(format!(
            "{parent} is not a folder"
        ))),
        Err(_) => Err(CoreError::validation(format!(
            "parent {parent} does not exist"
        ))),
    }
}
