//! Documents: one entry in the root index plus the file entries it lists.

use crate::error::{CoreError, CoreResult};
use crate::metadata::{DocType, Metadata};
use docsync_codec::{content_hash, decode, encode, hash_entries, Entry, EntryKind};
use docsync_storage::RemoteStorage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Suffix of the metadata file id.
pub const METADATA_SUFFIX: &str = ".metadata";

/// Suffix of the content descriptor file id.
pub const CONTENT_SUFFIX: &str = ".content";

/// Suffix of the page data file id.
pub const PAGEDATA_SUFFIX: &str = ".pagedata";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentDescriptor<'a> {
    file_type: &'a str,
}

/// Generates a fresh document id.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A document and its files.
///
/// # Invariants
///
/// - `files` are unique by id and sorted by id
/// - `entry.hash == hash_entries(files)`, `entry.child_count == files.len()`
///   and `entry.size` is the sum of the file sizes
///
/// Blobs produced locally are staged on the document until they are
/// uploaded; the staging area is not persisted in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    entry: Entry,
    files: Vec<Entry>,
    /// Document metadata.
    pub metadata: Metadata,
    #[serde(skip)]
    staged: BTreeMap<String, Vec<u8>>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.entry == other.entry && self.files == other.files && self.metadata == other.metadata
    }
}

impl Eq for Document {}

impl Document {
    /// Creates a document with no files and default metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            entry: Entry::doc(id),
            files: Vec::new(),
            metadata: Metadata::new("", "", DocType::Document),
            staged: BTreeMap::new(),
        }
    }

    /// Creates a collection with its metadata and an empty content
    /// descriptor, all staged for upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be serialized.
    pub fn new_collection(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> CoreResult<Self> {
        let mut doc = Self::new(id);
        doc.metadata = Metadata::new(name, parent_id, DocType::Collection);
        let id = doc.id().to_string();
        doc.add_file_content(format!("{id}{CONTENT_SUFFIX}"), b"{}".to_vec())?;
        doc.stage_metadata()?;
        Ok(doc)
    }

    /// Creates a document holding `payload` as `<id>.<ext>`, with metadata,
    /// content descriptor and empty page data, all staged for upload.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or path-like extension.
    pub fn new_document(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: impl Into<String>,
        ext: &str,
        payload: Vec<u8>,
    ) -> CoreResult<Self> {
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::validation(format!(
                "invalid file extension {ext:?}"
            )));
        }
        let mut doc = Self::new(id);
        doc.metadata = Metadata::new(name, parent_id, DocType::Document);
        let id = doc.id().to_string();
        let descriptor = serde_json::to_vec(&ContentDescriptor { file_type: ext })?;
        doc.add_file_content(format!("{id}{CONTENT_SUFFIX}"), descriptor)?;
        doc.add_file_content(format!("{id}.{ext}"), payload)?;
        doc.add_file_content(format!("{id}{PAGEDATA_SUFFIX}"), Vec::new())?;
        doc.stage_metadata()?;
        Ok(doc)
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    /// Returns the document's entry in the root index.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns the document hash.
    pub fn hash(&self) -> &str {
        &self.entry.hash
    }

    /// Returns the file entries, sorted by id.
    pub fn files(&self) -> &[Entry] {
        &self.files
    }

    /// Looks up a file entry by id.
    pub fn file(&self, id: &str) -> Option<&Entry> {
        self.position(id).ok().map(|i| &self.files[i])
    }

    fn position(&self, id: &str) -> Result<usize, usize> {
        self.files.binary_search_by(|f| f.id.as_str().cmp(id))
    }

    /// Returns true if the document is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.metadata.deleted
    }

    /// Returns true if the document is a collection.
    pub fn is_collection(&self) -> bool {
        self.metadata.is_collection()
    }

    /// Inserts a file entry, replacing one with the same id, and rehashes.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for non-file entries, or a codec error if a
    /// hash is malformed.
    pub fn add_file(&mut self, entry: Entry) -> CoreResult<()> {
        if entry.kind != EntryKind::File {
            return Err(CoreError::validation(format!(
                "{} is not a file entry",
                entry.id
            )));
        }
        match self.position(&entry.id) {
            Ok(i) => self.files[i] = entry,
            Err(i) => self.files.insert(i, entry),
        }
        self.rehash()
    }

    /// Adds a file built from `content` and stages the bytes for upload.
    ///
    /// # Errors
    ///
    /// See [`Document::add_file`].
    pub fn add_file_content(&mut self, id: impl Into<String>, content: Vec<u8>) -> CoreResult<()> {
        let entry = Entry::file(id, &content);
        self.staged.insert(entry.hash.clone(), content);
        self.add_file(entry)
    }

    /// Removes a file and rehashes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no file has this id.
    pub fn remove_file(&mut self, id: &str) -> CoreResult<Entry> {
        let i = self
            .position(id)
            .map_err(|_| CoreError::not_found(format!("file {id} in document {}", self.id())))?;
        let removed = self.files.remove(i);
        self.rehash()?;
        Ok(removed)
    }

    /// Recomputes hash, child count and size from the files.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a file hash is malformed.
    pub fn rehash(&mut self) -> CoreResult<()> {
        self.entry.hash = hash_entries(&self.files)?;
        self.entry.child_count = self.files.len() as u32;
        self.entry.size = self.files.iter().map(|f| f.size).sum();
        Ok(())
    }

    /// Checks the hash invariants without modifying the document.
    ///
    /// # Errors
    ///
    /// Returns `Integrity` on mismatch.
    pub fn verify(&self) -> CoreResult<()> {
        let hash = hash_entries(&self.files)?;
        if hash != self.entry.hash {
            return Err(CoreError::integrity(format!(
                "document {}: stored hash {} but files hash to {hash}",
                self.id(),
                self.entry.hash
            )));
        }
        if self.entry.child_count as usize != self.files.len() {
            return Err(CoreError::integrity(format!(
                "document {}: child count {} for {} files",
                self.id(),
                self.entry.child_count,
                self.files.len()
            )));
        }
        Ok(())
    }

    /// Renames the document.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.metadata.name = name.into();
        self.metadata.touch();
    }

    /// Moves the document under another parent.
    pub fn move_to(&mut self, parent_id: impl Into<String>) {
        self.metadata.parent_id = parent_id.into();
        self.metadata.touch();
    }

    /// Records the page the document was last opened at.
    pub fn set_page(&mut self, page: u32) {
        self.metadata.last_opened_page = page;
        self.metadata.touch();
    }

    /// Flags the document as deleted.
    pub fn mark_deleted(&mut self) {
        self.metadata.deleted = true;
        self.metadata.touch();
    }

    /// Serializes the metadata, points the metadata file entry at the new
    /// blob, rehashes and stages the bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the document has no metadata file.
    pub fn metadata_blob(&mut self) -> CoreResult<(String, Vec<u8>)> {
        let id = self
            .files
            .iter()
            .find(|f| f.is_metadata())
            .map(|f| f.id.clone())
            .ok_or_else(|| CoreError::not_found(format!("metadata file of {}", self.id())))?;
        self.write_metadata(id)
    }

    fn stage_metadata(&mut self) -> CoreResult<(String, Vec<u8>)> {
        let id = format!("{}{METADATA_SUFFIX}", self.id());
        self.write_metadata(id)
    }

    fn write_metadata(&mut self, file_id: String) -> CoreResult<(String, Vec<u8>)> {
        let bytes = self.metadata.to_blob()?;
        let hash = content_hash(&bytes);
        self.add_file_content(file_id, bytes.clone())?;
        Ok((hash, bytes))
    }

    /// Encodes the document index blob.
    pub fn index_blob(&self) -> Vec<u8> {
        encode(&self.files)
    }

    /// Returns the staged bytes for `hash`, if any.
    pub fn staged(&self, hash: &str) -> Option<&[u8]> {
        self.staged.get(hash).map(Vec::as_slice)
    }

    /// Iterates over staged blobs that the current files still reference.
    pub fn staged_blobs(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.staged
            .iter()
            .filter(|(hash, _)| self.files.iter().any(|f| &f.hash == *hash))
            .map(|(hash, bytes)| (hash.as_str(), bytes.as_slice()))
    }

    /// Drops staged blobs and the dirty flag after a successful commit.
    pub fn mark_committed(&mut self) {
        self.staged.clear();
        self.metadata.dirty = false;
    }

    /// Reconciles the files with the remote file list.
    ///
    /// Files with an unchanged hash are kept without fetching. Changed and
    /// new files are fetched and checked against their hash; a fetched
    /// metadata blob replaces the local metadata. Files absent remotely are
    /// dropped. The document is left untouched if any step fails.
    ///
    /// Returns the number of blobs fetched.
    ///
    /// # Errors
    ///
    /// Returns the storage error of a failed fetch, or `Integrity` if a blob
    /// or the resulting file list does not match its hash.
    pub fn mirror_from<S: RemoteStorage + ?Sized>(
        &mut self,
        remote_entry: &Entry,
        remote_files: &[Entry],
        storage: &S,
    ) -> CoreResult<usize> {
        let local: HashMap<&str, &str> = self
            .files
            .iter()
            .map(|f| (f.id.as_str(), f.hash.as_str()))
            .collect();

        let mut files = remote_files.to_vec();
        files.sort_by(|a, b| a.id.cmp(&b.id));

        let mut fetched = 0;
        let mut metadata = None;
        for file in &files {
            if local.get(file.id.as_str()) == Some(&file.hash.as_str()) {
                continue;
            }
            let bytes = storage.get_blob(&file.hash)?;
            fetched += 1;
            if content_hash(&bytes) != file.hash {
                return Err(CoreError::integrity(format!(
                    "blob {} of {} does not match its hash",
                    file.hash, file.id
                )));
            }
            if file.is_metadata() {
                metadata = Some(Metadata::from_blob(&bytes)?);
            }
            debug!(file = %file.id, hash = %file.hash, "fetched file");
        }

        let hash = hash_entries(&files)?;
        if hash != remote_entry.hash {
            return Err(CoreError::integrity(format!(
                "document {}: remote files hash to {hash}, index says {}",
                remote_entry.id, remote_entry.hash
            )));
        }

        self.files = files;
        self.entry = remote_entry.clone();
        self.entry.child_count = self.files.len() as u32;
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
        self.staged.clear();
        Ok(fetched)
    }

    /// Fetches the remote index of this document and mirrors onto it.
    ///
    /// Returns the number of blobs fetched, index included.
    ///
    /// # Errors
    ///
    /// See [`Document::mirror_from`]; also fails if the index cannot be
    /// decoded.
    pub fn refresh<S: RemoteStorage + ?Sized>(
        &mut self,
        remote_entry: &Entry,
        storage: &S,
    ) -> CoreResult<usize> {
        let index = storage.get_blob(&remote_entry.hash)?;
        let remote_files = decode(&index)?;
        Ok(1 + self.mirror_from(remote_entry, &remote_files, storage)?)
    }

    /// Builds a document from the remote, fetching all of its files.
    ///
    /// # Errors
    ///
    /// See [`Document::refresh`].
    pub fn from_remote<S: RemoteStorage + ?Sized>(
        remote_entry: &Entry,
        storage: &S,
    ) -> CoreResult<(Self, usize)> {
        let mut doc = Self::new(remote_entry.id.clone());
        let fetched = doc.refresh(remote_entry, storage)?;
        Ok((doc, fetched))
    }
}
