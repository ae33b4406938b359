//! A storage wrapper that records traffic and injects failures.

use docsync_storage::{RemoteStorage, RootPointer, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::Read;

/// Number of calls per storage operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `get_root` calls.
    pub get_root: usize,
    /// Blob reads (`get_reader`, and `get_blob` through it).
    pub fetch: usize,
    /// `put_blob` calls.
    pub put_blob: usize,
    /// `cas_root` calls.
    pub cas_root: usize,
    /// `sync_complete` calls.
    pub sync_complete: usize,
}

impl CallCounts {
    /// Total number of calls.
    pub fn total(&self) -> usize {
        self.get_root + self.fetch + self.put_blob + self.cas_root + self.sync_complete
    }
}

#[derive(Debug, Default)]
struct Recorder {
    counts: CallCounts,
    fetched: Vec<String>,
    uploaded: Vec<String>,
    cas_failures: usize,
    cas_always_fails: bool,
    failing_fetches: HashSet<String>,
    sync_complete_fails: bool,
    sync_complete_superseded: bool,
}

/// Wraps a [`RemoteStorage`], counting calls, recording fetched and
/// uploaded hashes, and failing selected calls on demand.
pub struct RecordingStorage<S> {
    inner: S,
    recorder: Mutex<Recorder>,
}

impl<S: RemoteStorage> RecordingStorage<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            recorder: Mutex::new(Recorder::default()),
        }
    }

    /// Returns the wrapped storage.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the call counts so far.
    pub fn counts(&self) -> CallCounts {
        self.recorder.lock().counts
    }

    /// Returns fetched blob hashes, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.recorder.lock().fetched.clone()
    }

    /// Returns uploaded blob hashes, in call order.
    pub fn uploaded(&self) -> Vec<String> {
        self.recorder.lock().uploaded.clone()
    }

    /// Clears counts and recorded hashes. Injected failures stay armed.
    pub fn reset(&self) {
        let mut recorder = self.recorder.lock();
        recorder.counts = CallCounts::default();
        recorder.fetched.clear();
        recorder.uploaded.clear();
    }

    /// Rejects the next `n` root swaps with `WrongGeneration`.
    pub fn fail_next_cas(&self, n: usize) {
        self.recorder.lock().cas_failures = n;
    }

    /// Rejects every root swap with `WrongGeneration`.
    pub fn fail_all_cas(&self) {
        self.recorder.lock().cas_always_fails = true;
    }

    /// Fails reads of `hash` with a network error.
    pub fn fail_fetch(&self, hash: impl Into<String>) {
        self.recorder.lock().failing_fetches.insert(hash.into());
    }

    /// Fails sync-complete notifications with a network error.
    pub fn fail_sync_complete(&self) {
        self.recorder.lock().sync_complete_fails = true;
    }

    /// Answers sync-complete notifications with `Conflict`, as the remote
    /// does once a newer generation exists.
    pub fn supersede_sync_complete(&self) {
        self.recorder.lock().sync_complete_superseded = true;
    }
}

impl<S: RemoteStorage> RemoteStorage for RecordingStorage<S> {
    fn get_root(&self) -> StorageResult<RootPointer> {
        self.recorder.lock().counts.get_root += 1;
        self.inner.get_root()
    }

    fn get_reader(&self, hash: &str) -> StorageResult<Box<dyn Read + Send>> {
        {
            let mut recorder = self.recorder.lock();
            recorder.counts.fetch += 1;
            recorder.fetched.push(hash.to_string());
            if recorder.failing_fetches.contains(hash) {
                return Err(StorageError::network(format!("injected fetch failure for {hash}")));
            }
        }
        self.inner.get_reader(hash)
    }

    fn put_blob(&self, hash: &str, content: &[u8]) -> StorageResult<()> {
        {
            let mut recorder = self.recorder.lock();
            recorder.counts.put_blob += 1;
            recorder.uploaded.push(hash.to_string());
        }
        self.inner.put_blob(hash, content)
    }

    fn cas_root(&self, hash: &str, expected_generation: u64) -> StorageResult<u64> {
        {
            let mut recorder = self.recorder.lock();
            recorder.counts.cas_root += 1;
            if recorder.cas_always_fails || recorder.cas_failures > 0 {
                recorder.cas_failures = recorder.cas_failures.saturating_sub(1);
                return Err(StorageError::WrongGeneration {
                    expected: expected_generation,
                });
            }
        }
        self.inner.cas_root(hash, expected_generation)
    }

    fn sync_complete(&self, generation: u64) -> StorageResult<()> {
        {
            let mut recorder = self.recorder.lock();
            recorder.counts.sync_complete += 1;
            if recorder.sync_complete_fails {
                return Err(StorageError::network("injected sync-complete failure"));
            }
            if recorder.sync_complete_superseded {
                return Err(StorageError::Conflict { generation });
            }
        }
        self.inner.sync_complete(generation)
    }
}
