//! Pull reconciliation: bring the local tree up to the remote root.
//!
//! ## Algorithm
//!
//! 1. Read the remote root pointer. If its hash equals the local root hash,
//!    or the remote was never written and the local tree is empty, there is
//!    nothing to do.
//! 2. Fetch and decode the remote root index (an unset root is an empty
//!    index).
//! 3. Partition the remote documents by id: *kept* (same hash as the local
//!    copy, no fetch), *changed* (refreshed file by file) and *new* (fetched
//!    fully). Local documents the remote no longer lists are dropped.
//! 4. Changed and new documents are fetched by a fixed pool of workers.
//!    The first failure cancels the remaining work and is returned; the
//!    local tree is only replaced once every document has been fetched.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use docsync_codec::{decode, Entry};
use docsync_core::{CoreResult, Document, HashTree};
use docsync_storage::RemoteStorage;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use tracing::{debug, info};

/// Outcome of a mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    /// The remote root already matched: nothing was fetched.
    pub up_to_date: bool,
    /// Documents whose hash was unchanged.
    pub kept: usize,
    /// Documents refreshed from the remote.
    pub changed: usize,
    /// Documents fetched for the first time.
    pub added: usize,
    /// Local documents the remote no longer lists.
    pub removed: usize,
    /// Blobs fetched, index blobs included.
    pub fetched: usize,
    /// Remote generation after the mirror.
    pub generation: u64,
}

/// A document to fetch: refresh a local copy, or build a new one.
struct WorkItem {
    local: Option<Document>,
    remote: Entry,
}

impl WorkItem {
    fn fetch<S: RemoteStorage + ?Sized>(self, storage: &S) -> CoreResult<(Document, usize)> {
        match self.local {
            Some(mut doc) => {
                let fetched = doc.refresh(&self.remote, storage)?;
                debug!(document = %self.remote.id, fetched, "refreshed document");
                Ok((doc, fetched))
            }
            None => {
                let (doc, fetched) = Document::from_remote(&self.remote, storage)?;
                debug!(document = %self.remote.id, fetched, "fetched new document");
                Ok((doc, fetched))
            }
        }
    }
}

/// Reconciles a [`HashTree`] with the remote.
#[derive(Debug, Clone)]
pub struct Mirror {
    concurrency: usize,
}

impl Mirror {
    /// Creates a mirror fetching up to `concurrency` documents at a time.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Creates a mirror with the configured worker count.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.concurrency)
    }

    /// Returns the worker count.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Mirrors the remote state into `tree`.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, decode or integrity error. `tree` is left
    /// untouched on error.
    pub fn run<S: RemoteStorage + ?Sized>(
        &self,
        tree: &mut HashTree,
        storage: &S,
    ) -> SyncResult<MirrorReport> {
        let root = storage.get_root()?;
        if root.hash == tree.root_hash() || (root.is_unset() && tree.is_empty()) {
            tree.accept_generation(root.generation);
            debug!(generation = root.generation, "remote root unchanged");
            return Ok(MirrorReport {
                up_to_date: true,
                kept: tree.len(),
                generation: root.generation,
                ..MirrorReport::default()
            });
        }

        let mut report = MirrorReport {
            generation: root.generation,
            ..MirrorReport::default()
        };
        let remote_entries = if root.is_unset() {
            Vec::new()
        } else {
            report.fetched += 1;
            decode(&storage.get_blob(&root.hash)?)?
        };

        let local: HashMap<&str, &Document> =
            tree.documents().iter().map(|d| (d.id(), d)).collect();
        let mut documents = Vec::with_capacity(remote_entries.len());
        let mut work = VecDeque::new();
        for entry in remote_entries {
            match local.get(entry.id.as_str()) {
                Some(doc) if doc.hash() == entry.hash => {
                    report.kept += 1;
                    documents.push((*doc).clone());
                }
                Some(doc) => {
                    report.changed += 1;
                    work.push_back(WorkItem {
                        local: Some((*doc).clone()),
                        remote: entry,
                    });
                }
                None => {
                    report.added += 1;
                    work.push_back(WorkItem {
                        local: None,
                        remote: entry,
                    });
                }
            }
        }
        let listed: HashSet<&str> = documents
            .iter()
            .map(Document::id)
            .chain(work.iter().map(|w| w.remote.id.as_str()))
            .collect();
        report.removed = local.keys().filter(|id| !listed.contains(*id)).count();

        let (fetched_docs, fetched) = self.fetch_all(work, storage)?;
        documents.extend(fetched_docs);
        report.fetched += fetched;

        tree.install_remote_state(documents, &root)?;
        info!(
            kept = report.kept,
            changed = report.changed,
            added = report.added,
            removed = report.removed,
            fetched = report.fetched,
            generation = report.generation,
            "mirror complete"
        );
        Ok(report)
    }

    /// Fetches every work item on a fixed pool of scoped threads.
    fn fetch_all<S: RemoteStorage + ?Sized>(
        &self,
        work: VecDeque<WorkItem>,
        storage: &S,
    ) -> SyncResult<(Vec<Document>, usize)> {
        if work.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let workers = self.concurrency.min(work.len());
        let queue = Mutex::new(work);
        let cancelled = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let cancelled = &cancelled;
                scope.spawn(move || {
                    while !cancelled.load(Ordering::Acquire) {
                        let Some(item) = queue.lock().pop_front() else {
                            break;
                        };
                        let result = item.fetch(storage);
                        if result.is_err() {
                            cancelled.store(true, Ordering::Release);
                        }
                        if tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            let mut documents = Vec::new();
            let mut fetched = 0;
            let mut first_error = None;
            for result in rx {
                match result {
                    Ok((doc, n)) => {
                        documents.push(doc);
                        fetched += n;
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            match first_error {
                Some(e) => Err(e.into()),
                None => Ok((documents, fetched)),
            }
        })
    }
}

impl Default for Mirror {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_storage::LocalDirectoryStorage;
    use tempfile::tempdir;

    /// Publishes `tree` to the remote as the next generation.
    fn publish(storage: &LocalDirectoryStorage, tree: &HashTree) -> u64 {
        for doc in tree.documents() {
            for (hash, bytes) in doc.staged_blobs() {
                storage.put_blob(hash, bytes).unwrap();
            }
            storage.put_blob(doc.hash(), &doc.index_blob()).unwrap();
        }
        storage.put_blob(tree.root_hash(), &tree.index_blob()).unwrap();
        let current = storage.get_root().unwrap().generation;
        storage.cas_root(tree.root_hash(), current).unwrap()
    }

    fn folder(id: &str) -> Document {
        Document::new_collection(id, id.to_uppercase(), "").unwrap()
    }

    #[test]
    fn unset_remote_yields_empty_tree() {
        let dir = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
        let mut tree = HashTree::new();
        tree.add(folder("a")).unwrap();

        let report = Mirror::new(2).run(&mut tree, &storage).unwrap();
        assert!(tree.is_empty());
        assert_eq!(report.removed, 1);
        assert_eq!(report.fetched, 0);
    }

    #[test]
    fn unset_remote_and_empty_tree_are_in_sync() {
        let dir = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
        let mut tree = HashTree::new();

        let report = Mirror::new(2).run(&mut tree, &storage).unwrap();
        assert!(report.up_to_date);
        assert_eq!(tree, HashTree::new());
    }

    #[test]
    fn fetches_new_and_drops_removed() {
        let dir = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
        let mut remote = HashTree::new();
        remote.add(folder("a")).unwrap();
        remote.add(folder("b")).unwrap();
        let generation = publish(&storage, &remote);

        let mut local = HashTree::new();
        local.add(folder("z")).unwrap();
        let report = Mirror::new(4).run(&mut local, &storage).unwrap();

        assert_eq!(report.added, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(local.root_hash(), remote.root_hash());
        assert_eq!(local.generation(), generation);
        local.verify().unwrap();
    }

    #[test]
    fn up_to_date_accepts_generation() {
        let dir = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
        let mut remote = HashTree::new();
        remote.add(folder("a")).unwrap();
        publish(&storage, &remote);
        let generation = publish(&storage, &remote);

        let mut local = remote.clone();
        let report = Mirror::new(1).run(&mut local, &storage).unwrap();
        assert!(report.up_to_date);
        assert_eq!(local.generation(), generation);
    }

    #[test]
    fn failure_leaves_tree_untouched() {
        let dir = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
        let mut remote = HashTree::new();
        for id in ["a", "b", "c", "d"] {
            remote.add(folder(id)).unwrap();
        }
        // Only the root index is published.
        storage.put_blob(remote.root_hash(), &remote.index_blob()).unwrap();
        storage.cas_root(remote.root_hash(), 0).unwrap();

        let mut local = HashTree::new();
        local.add(folder("x")).unwrap();
        let before = local.clone();
        let err = Mirror::new(2).run(&mut local, &storage).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(local, before);
    }

    #[test]
    fn concurrency_is_at_least_one() {
        assert_eq!(Mirror::new(0).concurrency(), 1);
        assert_eq!(Mirror::default().concurrency(), 20);
    }
}
