//! The hash tree: the root index and every document below it.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use docsync_codec::{encode, hash_entries, Entry, EMPTY_HASH};
use docsync_storage::RootPointer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Version of the cache file layout. Caches stamped with another version
/// are discarded on load.
pub const CACHE_VERSION: u32 = 3;

/// Local view of the remote document collection.
///
/// # Invariants
///
/// - `documents` are unique by id and sorted by id
/// - `root_hash == hash_entries(document entries)`
/// - `generation` only changes by accepting a remote value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTree {
    root_hash: String,
    generation: u64,
    cache_version: u32,
    documents: Vec<Document>,
}

impl Default for HashTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HashTree {
    /// Creates an empty tree at generation 0.
    pub fn new() -> Self {
        Self {
            root_hash: EMPTY_HASH.to_string(),
            generation: 0,
            cache_version: CACHE_VERSION,
            documents: Vec::new(),
        }
    }

    /// Returns the root hash.
    pub fn root_hash(&self) -> &str {
        &self.root_hash
    }

    /// Returns the last generation accepted from the remote.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the cache layout version this tree was stamped with.
    pub fn cache_version(&self) -> u32 {
        self.cache_version
    }

    pub(crate) fn stamp_cache_version(&mut self) {
        self.cache_version = CACHE_VERSION;
    }

    /// Returns all documents, soft-deleted ones included, sorted by id.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the tree has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn position(&self, id: &str) -> Result<usize, usize> {
        self.documents.binary_search_by(|d| d.id().cmp(id))
    }

    /// Adds a document, replacing one with the same id, and rehashes.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the document has no files.
    pub fn add(&mut self, document: Document) -> CoreResult<()> {
        if document.files().is_empty() {
            return Err(CoreError::validation(format!(
                "document {} has no files",
                document.id()
            )));
        }
        match self.position(document.id()) {
            Ok(i) => self.documents[i] = document,
            Err(i) => self.documents.insert(i, document),
        }
        self.rehash()
    }

    /// Removes a document and rehashes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document has this id.
    pub fn remove(&mut self, id: &str) -> CoreResult<Document> {
        let i = self
            .position(id)
            .map_err(|_| CoreError::not_found(format!("document {id}")))?;
        let removed = self.documents.remove(i);
        self.rehash()?;
        Ok(removed)
    }

    /// Looks up a document.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document has this id.
    pub fn find_document(&self, id: &str) -> CoreResult<&Document> {
        self.position(id)
            .map(|i| &self.documents[i])
            .map_err(|_| CoreError::not_found(format!("document {id}")))
    }

    /// Looks up a document for modification. Call [`HashTree::rehash`]
    /// once done.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document has this id.
    pub fn find_document_mut(&mut self, id: &str) -> CoreResult<&mut Document> {
        match self.position(id) {
            Ok(i) => Ok(&mut self.documents[i]),
            Err(_) => Err(CoreError::not_found(format!("document {id}"))),
        }
    }

    /// Returns the document entries, sorted by id.
    pub fn entries(&self) -> Vec<Entry> {
        self.documents.iter().map(|d| d.entry().clone()).collect()
    }

    /// Recomputes the root hash from the document entries.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a document hash is malformed.
    pub fn rehash(&mut self) -> CoreResult<()> {
        self.root_hash = hash_entries(&self.entries())?;
        Ok(())
    }

    /// Encodes the root index blob.
    pub fn index_blob(&self) -> Vec<u8> {
        encode(&self.entries())
    }

    /// Recomputes every hash and compares it with the stored one.
    ///
    /// # Errors
    ///
    /// Returns `Integrity` on the first mismatch.
    pub fn verify(&self) -> CoreResult<()> {
        for window in self.documents.windows(2) {
            if window[0].id() >= window[1].id() {
                return Err(CoreError::integrity(format!(
                    "documents out of order at {}",
                    window[1].id()
                )));
            }
        }
        for doc in &self.documents {
            doc.verify()?;
        }
        let hash = hash_entries(&self.entries())?;
        if hash != self.root_hash {
            return Err(CoreError::integrity(format!(
                "stored root hash {} but documents hash to {hash}",
                self.root_hash
            )));
        }
        Ok(())
    }

    /// Accepts a generation assigned by the remote.
    pub fn accept_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Replaces the whole document set with a mirrored remote state.
    ///
    /// # Errors
    ///
    /// Returns `Integrity` if the documents do not hash to the remote root.
    /// The tree is left untouched in that case.
    pub fn install_remote_state(
        &mut self,
        mut documents: Vec<Document>,
        root: &RootPointer,
    ) -> CoreResult<()> {
        documents.sort_by(|a, b| a.id().cmp(b.id()));
        let entries: Vec<Entry> = documents.iter().map(|d| d.entry().clone()).collect();
        let hash = hash_entries(&entries)?;
        if !root.is_unset() && hash != root.hash {
            return Err(CoreError::integrity(format!(
                "remote root {} does not match its documents ({hash})",
                root.hash
            )));
        }
        self.documents = documents;
        self.root_hash = hash;
        self.generation = root.generation;
        Ok(())
    }

    /// Clears staging areas and dirty flags after a successful commit.
    pub fn mark_committed(&mut self) {
        for doc in &mut self.documents {
            doc.mark_committed();
        }
    }

    /// Iterates over documents that are not soft-deleted.
    pub fn live_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| !d.is_deleted())
    }

    /// Iterates over live documents directly under `parent_id`.
    pub fn children_of<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Document> {
        self.live_documents()
            .filter(move |d| d.metadata.parent_id == parent_id)
    }

    /// Returns the ids of every document below `id`, deleted ones included.
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(parent) = queue.pop_front() {
            for doc in &self.documents {
                if doc.metadata.parent_id == parent && found.insert(doc.id().to_string()) {
                    queue.push_back(doc.id().to_string());
                }
            }
        }
        found.remove(id);
        found
    }
}
