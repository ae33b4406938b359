//! Read-modify-commit with optimistic concurrency.
//!
//! A commit first brings a copy of the cached tree up to the remote root,
//! applies the mutation to it, uploads every blob the mutation produced, and
//! swaps the remote root with compare-and-swap on the mirrored generation.
//! Losing the race means another client committed in between: the protocol
//! mirrors the newer state and replays the mutation on top of it.
//!
//! ```text
//! Refreshing ──▶ Applying ──▶ Uploading ──▶ Committing ──▶ Done
//!                   ▲                          │
//!                   └──────── Mirroring ◀──────┘ (wrong generation)
//!
//! any step ──▶ Failed
//! ```

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::mirror::Mirror;
use docsync_core::{CacheStore, CoreResult, HashTree};
use docsync_storage::{RemoteStorage, StorageError};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// State of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// Mirroring the remote root before the first attempt.
    Refreshing,
    /// Running the mutation on a working copy.
    Applying,
    /// Uploading new blobs.
    Uploading,
    /// Swapping the remote root.
    Committing,
    /// Absorbing a newer remote state before retrying.
    Mirroring,
    /// The new root is live and cached.
    Done,
    /// The commit was abandoned.
    Failed,
}

impl CommitState {
    /// Returns true for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommitState::Done | CommitState::Failed)
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitState::Refreshing => "refreshing",
            CommitState::Applying => "applying",
            CommitState::Uploading => "uploading",
            CommitState::Committing => "committing",
            CommitState::Mirroring => "mirroring",
            CommitState::Done => "done",
            CommitState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Number of times the mutation was applied.
    pub attempts: u32,
    /// Number of conflict mirrors.
    pub mirrors: u32,
    /// Whether the initial refresh pulled a newer remote state.
    pub refreshed: bool,
    /// Hashes of the uploaded blobs, in upload order.
    pub uploaded: Vec<String>,
    /// Generation assigned by the remote.
    pub generation: u64,
    /// The committed root hash.
    pub root_hash: String,
    /// Whether the sync-complete notification was accepted.
    pub notified: bool,
    /// Every state visited, terminal state included.
    pub transitions: Vec<CommitState>,
}

/// Drives one commit through the state machine.
pub struct CommitProtocol<'a, S: RemoteStorage + ?Sized> {
    storage: &'a S,
    cache: &'a CacheStore,
    mirror: Mirror,
    max_attempts: u32,
}

impl<'a, S: RemoteStorage + ?Sized> CommitProtocol<'a, S> {
    /// Creates a protocol committing to `storage` and persisting to `cache`.
    pub fn new(storage: &'a S, cache: &'a CacheStore, config: &SyncConfig) -> Self {
        Self {
            storage,
            cache,
            mirror: Mirror::from_config(config),
            max_attempts: config.max_commit_attempts.max(1),
        }
    }

    /// Commits `mutate` on top of `cached`, after bringing a copy of it up
    /// to the remote root.
    ///
    /// On success `cached` holds the committed tree, which has also been
    /// saved to the cache. On failure `cached` is unchanged.
    ///
    /// # Errors
    ///
    /// - the mutation's own error, without retrying
    /// - `Conflict` once every attempt lost the generation race
    /// - upload, mirror or cache errors
    pub fn run<F>(&self, cached: &mut HashTree, mut mutate: F) -> SyncResult<CommitReport>
    where
        F: FnMut(&mut HashTree) -> CoreResult<()>,
    {
        let mut base = cached.clone();
        let mut working = base.clone();
        let mut uploaded = HashSet::new();
        let mut report = CommitReport {
            attempts: 0,
            mirrors: 0,
            refreshed: false,
            uploaded: Vec::new(),
            generation: base.generation(),
            root_hash: base.root_hash().to_string(),
            notified: false,
            transitions: Vec::new(),
        };
        let mut failure: Option<SyncError> = None;
        let mut state = CommitState::Refreshing;

        loop {
            report.transitions.push(state);
            debug!(%state, attempt = report.attempts, "commit state");
            state = match state {
                CommitState::Refreshing => match self.mirror.run(&mut base, self.storage) {
                    Ok(mirrored) => {
                        report.refreshed = !mirrored.up_to_date;
                        CommitState::Applying
                    }
                    Err(e) => {
                        failure = Some(e);
                        CommitState::Failed
                    }
                },
                CommitState::Applying => {
                    report.attempts += 1;
                    working.clone_from(&base);
                    match apply(&mut working, &mut mutate) {
                        Ok(()) => CommitState::Uploading,
                        Err(e) => {
                            failure = Some(e.into());
                            CommitState::Failed
                        }
                    }
                }
                CommitState::Uploading => {
                    match self.upload(&base, &working, &mut uploaded, &mut report.uploaded) {
                        Ok(()) => CommitState::Committing,
                        Err(e) => {
                            failure = Some(e.into());
                            CommitState::Failed
                        }
                    }
                }
                CommitState::Committing => {
                    match self
                        .storage
                        .cas_root(working.root_hash(), base.generation())
                    {
                        Ok(generation) => {
                            working.accept_generation(generation);
                            working.mark_committed();
                            match self.cache.save(&working) {
                                Ok(()) => CommitState::Done,
                                Err(e) => {
                                    failure = Some(e.into());
                                    CommitState::Failed
                                }
                            }
                        }
                        Err(StorageError::WrongGeneration { expected })
                            if report.attempts < self.max_attempts =>
                        {
                            warn!(
                                expected,
                                attempt = report.attempts,
                                "remote root moved, rebasing"
                            );
                            CommitState::Mirroring
                        }
                        Err(StorageError::WrongGeneration { .. }) => {
                            failure = Some(SyncError::Conflict {
                                attempts: report.attempts,
                            });
                            CommitState::Failed
                        }
                        Err(e) => {
                            failure = Some(e.into());
                            CommitState::Failed
                        }
                    }
                }
                CommitState::Mirroring => {
                    report.mirrors += 1;
                    match self.mirror.run(&mut base, self.storage) {
                        Ok(_) => CommitState::Applying,
                        Err(e) => {
                            failure = Some(e);
                            CommitState::Failed
                        }
                    }
                }
                CommitState::Done | CommitState::Failed => break,
            };
        }

        if let Some(e) = failure {
            warn!(attempts = report.attempts, error = %e, "commit failed");
            return Err(e);
        }

        report.generation = working.generation();
        report.root_hash = working.root_hash().to_string();
        *cached = working;
        report.notified = self.notify(report.generation);
        info!(
            generation = report.generation,
            attempts = report.attempts,
            uploaded = report.uploaded.len(),
            "commit complete"
        );
        Ok(report)
    }

    /// Uploads blobs of documents that differ from `base`, then the root
    /// index. Hashes in `seen` are skipped.
    fn upload(
        &self,
        base: &HashTree,
        working: &HashTree,
        seen: &mut HashSet<String>,
        uploaded: &mut Vec<String>,
    ) -> Result<(), StorageError> {
        let mut put = |hash: &str, bytes: &[u8]| -> Result<(), StorageError> {
            if seen.contains(hash) {
                return Ok(());
            }
            self.storage.put_blob(hash, bytes)?;
            seen.insert(hash.to_string());
            uploaded.push(hash.to_string());
            Ok(())
        };

        for doc in working.documents() {
            let unchanged = base
                .find_document(doc.id())
                .map(|old| old.hash() == doc.hash())
                .unwrap_or(false);
            if unchanged {
                continue;
            }
            for (hash, bytes) in doc.staged_blobs() {
                put(hash, bytes)?;
            }
            put(doc.hash(), &doc.index_blob())?;
        }
        put(working.root_hash(), &working.index_blob())
    }

    /// Sends the sync-complete notification. A conflict means a newer
    /// generation exists already and counts as delivered.
    fn notify(&self, generation: u64) -> bool {
        match self.storage.sync_complete(generation) {
            Ok(()) => true,
            Err(StorageError::Conflict { .. }) => {
                debug!(generation, "sync-complete superseded");
                true
            }
            Err(e) => {
                warn!(generation, error = %e, "sync-complete notification failed");
                false
            }
        }
    }
}

/// Runs the mutation and re-serializes dirty metadata.
fn apply<F>(tree: &mut HashTree, mutate: &mut F) -> CoreResult<()>
where
    F: FnMut(&mut HashTree) -> CoreResult<()>,
{
    mutate(tree)?;
    let dirty: Vec<String> = tree
        .documents()
        .iter()
        .filter(|d| d.metadata.dirty)
        .map(|d| d.id().to_string())
        .collect();
    for id in dirty {
        tree.find_document_mut(&id)?.metadata_blob()?;
    }
    tree.rehash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::{CoreError, Document};
    use docsync_storage::LocalDirectoryStorage;
    use tempfile::tempdir;

    #[test]
    fn first_commit_goes_straight_through() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(remote.path()).unwrap();
        let cache = CacheStore::new(local.path().join("tree.json"));
        let protocol = CommitProtocol::new(&storage, &cache, &SyncConfig::default());

        let mut tree = HashTree::new();
        let report = protocol
            .run(&mut tree, |t| t.add(Document::new_collection("f", "Books", "")?))
            .unwrap();

        assert_eq!(
            report.transitions,
            [
                CommitState::Refreshing,
                CommitState::Applying,
                CommitState::Uploading,
                CommitState::Committing,
                CommitState::Done
            ]
        );
        assert_eq!(report.attempts, 1);
        assert!(!report.refreshed);
        assert_eq!(report.generation, 1);
        assert!(report.notified);
        // content, metadata, document index, root index
        assert_eq!(report.uploaded.len(), 4);
        assert_eq!(tree.generation(), 1);
        assert_eq!(storage.get_root().unwrap().hash, tree.root_hash());
        assert_eq!(cache.load(), tree);
    }

    #[test]
    fn mutation_error_is_not_retried() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(remote.path()).unwrap();
        let cache = CacheStore::new(local.path().join("tree.json"));
        let protocol = CommitProtocol::new(&storage, &cache, &SyncConfig::default());

        let mut tree = HashTree::new();
        let mut calls = 0;
        let err = protocol
            .run(&mut tree, |_| {
                calls += 1;
                Err(CoreError::validation("nope"))
            })
            .unwrap_err();

        assert!(matches!(err, SyncError::Core(CoreError::Validation { .. })));
        assert_eq!(calls, 1);
        assert!(storage.get_root().unwrap().is_unset());
        assert!(!cache.path().exists());
    }

    #[test]
    fn stale_cache_is_refreshed_before_applying() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(remote.path()).unwrap();
        let config = SyncConfig::default();

        let writer_cache = CacheStore::new(local.path().join("writer.json"));
        let mut writer = HashTree::new();
        CommitProtocol::new(&storage, &writer_cache, &config)
            .run(&mut writer, |t| t.add(Document::new_collection("f", "Books", "")?))
            .unwrap();

        let cache = CacheStore::new(local.path().join("stale.json"));
        let mut stale = HashTree::new();
        let report = CommitProtocol::new(&storage, &cache, &config)
            .run(&mut stale, |t| {
                t.find_document_mut("f")?.rename("Library");
                Ok(())
            })
            .unwrap();

        assert!(report.refreshed);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.mirrors, 0);
        assert_eq!(report.generation, 2);
        assert_eq!(stale.find_document("f").unwrap().metadata.name, "Library");
    }

    #[test]
    fn refresh_failure_leaves_tree_untouched() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(remote.path()).unwrap();
        let cache = CacheStore::new(local.path().join("tree.json"));
        storage.put_blob("abcd", b"not an index").unwrap();
        storage.cas_root("abcd", 0).unwrap();

        let mut tree = HashTree::new();
        let mut calls = 0;
        let err = CommitProtocol::new(&storage, &cache, &SyncConfig::default())
            .run(&mut tree, |_| {
                calls += 1;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::Codec(_)));
        assert_eq!(calls, 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn cache_save_failure_fails_commit() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        let blocker = local.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let storage = LocalDirectoryStorage::open(remote.path()).unwrap();
        let cache = CacheStore::new(blocker.join("tree.json"));
        let protocol = CommitProtocol::new(&storage, &cache, &SyncConfig::default());

        let mut tree = HashTree::new();
        let err = protocol
            .run(&mut tree, |t| t.add(Document::new_collection("f", "Books", "")?))
            .unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::Io(_))));
        assert!(tree.is_empty());
    }

    #[test]
    fn state_names() {
        assert_eq!(CommitState::Mirroring.to_string(), "mirroring");
        assert_eq!(CommitState::Refreshing.to_string(), "refreshing");
        assert!(CommitState::Done.is_terminal());
        assert!(!CommitState::Committing.is_terminal());
    }
}
