//! Document metadata and its blob format.
//!
//! The metadata blob is a JSON record shared with other clients of the
//! remote, so its field names and value encodings are fixed:
//!
//! ```json
//! {
//!   "visibleName": "Notes",
//!   "type": "DocumentType",
//!   "parent": "",
//!   "lastModified": "1700000000000",
//!   "lastOpenedPage": 0,
//!   "version": 1,
//!   "deleted": false,
//!   "pinned": false,
//!   "synced": true,
//!   "modified": false,
//!   "metadatamodified": false,
//!   "lastOpened": ""
//! }
//! ```
//!
//! Unknown fields are ignored on read. The local `dirty` flag never leaves
//! the cache.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Parent id of documents at the top level.
pub const ROOT_PARENT: &str = "";

/// Parent id of documents in the trash.
pub const TRASH_PARENT: &str = "trash";

/// Whether a document holds content or groups other documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    /// A document with a payload (pdf, epub, notebook).
    #[serde(rename = "DocumentType")]
    Document,
    /// A folder.
    #[serde(rename = "CollectionType")]
    Collection,
}

/// Per-document metadata.
///
/// Edited through the mutators on [`crate::Document`]. Every edit bumps
/// `version` and marks the record dirty until the new blob is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Display name.
    pub name: String,
    /// Id of the containing collection, [`ROOT_PARENT`] or [`TRASH_PARENT`].
    pub parent_id: String,
    /// Document or collection.
    pub doc_type: DocType,
    /// Edit counter, starts at 1.
    pub version: u32,
    /// Last modification time in unix milliseconds.
    pub last_modified: u64,
    /// Page the document was last opened at.
    pub last_opened_page: u32,
    /// Pinned ("favorite") flag.
    pub pinned: bool,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Local-only: the metadata changed since the last commit.
    #[serde(default)]
    pub dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRecord {
    visible_name: String,
    #[serde(rename = "type")]
    doc_type: DocType,
    #[serde(default)]
    parent: String,
    #[serde(default)]
    last_modified: String,
    #[serde(default)]
    last_opened_page: u32,
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    synced: bool,
    #[serde(default)]
    modified: bool,
    #[serde(default, rename = "metadatamodified")]
    metadata_modified: bool,
    #[serde(default)]
    last_opened: String,
}

fn default_version() -> u32 {
    1
}

/// Current time in unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl Metadata {
    /// Creates version-1 metadata stamped with the current time.
    pub fn new(name: impl Into<String>, parent_id: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            name: name.into(),
            parent_id: parent_id.into(),
            doc_type,
            version: 1,
            last_modified: now_millis(),
            last_opened_page: 0,
            pinned: false,
            deleted: false,
            dirty: false,
        }
    }

    /// Returns true for collections.
    pub fn is_collection(&self) -> bool {
        self.doc_type == DocType::Collection
    }

    /// Returns true if the document sits in the trash.
    pub fn is_trashed(&self) -> bool {
        self.parent_id == TRASH_PARENT
    }

    /// Records a local edit: bumps the version, marks dirty, updates the
    /// modification time.
    pub fn touch(&mut self) {
        self.version = self.version.saturating_add(1);
        self.dirty = true;
        self.last_modified = now_millis().max(self.last_modified);
    }

    /// Serializes to the metadata blob format.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if serialization fails.
    pub fn to_blob(&self) -> CoreResult<Vec<u8>> {
        let record = MetadataRecord {
            visible_name: self.name.clone(),
            doc_type: self.doc_type,
            parent: self.parent_id.clone(),
            last_modified: self.last_modified.to_string(),
            last_opened_page: self.last_opened_page,
            version: self.version,
            deleted: self.deleted,
            pinned: self.pinned,
            synced: true,
            modified: false,
            metadata_modified: false,
            last_opened: String::new(),
        };
        Ok(serde_json::to_vec_pretty(&record)?)
    }

    /// Parses a metadata blob. The result is clean.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the blob is not a metadata record.
    pub fn from_blob(bytes: &[u8]) -> CoreResult<Self> {
        let record: MetadataRecord = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::format(format!("invalid metadata blob: {e}")))?;
        let last_modified = if record.last_modified.is_empty() {
            0
        } else {
            record.last_modified.parse().map_err(|_| {
                CoreError::format(format!(
                    "invalid lastModified {:?}",
                    record.last_modified
                ))
            })?
        };
        Ok(Self {
            name: record.visible_name,
            parent_id: record.parent,
            doc_type: record.doc_type,
            version: record.version,
            last_modified,
            last_opened_page: record.last_opened_page,
            pinned: record.pinned,
            deleted: record.deleted,
            dirty: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip_drops_dirty() {
        let mut meta = Metadata::new("Notes", ROOT_PARENT, DocType::Document);
        meta.touch();
        assert!(meta.dirty);
        assert_eq!(meta.version, 2);

        let parsed = Metadata::from_blob(&meta.to_blob().unwrap()).unwrap();
        assert!(!parsed.dirty);
        assert_eq!(parsed.name, "Notes");
        assert_eq!(parsed.version, 2);
        assert_eq!(parsed.last_modified, meta.last_modified);
    }

    #[test]
    fn blob_field_names() {
        let meta = Metadata::new("Books", "trash", DocType::Collection);
        let value: serde_json::Value = serde_json::from_slice(&meta.to_blob().unwrap()).unwrap();
        assert_eq!(value["visibleName"], "Books");
        assert_eq!(value["type"], "CollectionType");
        assert_eq!(value["parent"], "trash");
        assert!(value["lastModified"].is_string());
        assert!(value.get("dirty").is_none());
    }

    #[test]
    fn parses_foreign_record() {
        let blob = br#"{
            "visibleName": "Paper",
            "type": "DocumentType",
            "parent": "f00",
            "lastModified": "1650000000000",
            "version": 7,
            "extraField": [1, 2, 3]
        }"#;
        let meta = Metadata::from_blob(blob).unwrap();
        assert_eq!(meta.parent_id, "f00");
        assert_eq!(meta.version, 7);
        assert_eq!(meta.last_modified, 1_650_000_000_000);
        assert!(!meta.deleted);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Metadata::from_blob(b"not json"),
            Err(CoreError::Format { .. })
        ));
        let bad_time = br#"{"visibleName":"x","type":"DocumentType","lastModified":"soon"}"#;
        assert!(matches!(
            Metadata::from_blob(bad_time),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn trash_and_collection() {
        let meta = Metadata::new("x", TRASH_PARENT, DocType::Collection);
        assert!(meta.is_trashed());
        assert!(meta.is_collection());
    }
}
