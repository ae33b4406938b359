//! Index entries.

use crate::error::{CodecError, CodecResult};
use crate::hash::content_hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire tag for file entries.
pub const FILE_KIND_TAG: &str = "0";

/// Wire tag for document entries.
pub const DOC_KIND_TAG: &str = "80000000";

/// What an [`Entry`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A raw content blob (metadata, content descriptor, payload, ...).
    File,
    /// The index blob of a document, listing its file entries.
    Doc,
}

impl EntryKind {
    /// Returns the tag written in the index format.
    pub fn tag(&self) -> &'static str {
        match self {
            EntryKind::File => FILE_KIND_TAG,
            EntryKind::Doc => DOC_KIND_TAG,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntryKind {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        match s {
            FILE_KIND_TAG => Ok(EntryKind::File),
            DOC_KIND_TAG => Ok(EntryKind::Doc),
            other => Err(CodecError::format(format!("unknown entry kind {other:?}"))),
        }
    }
}

/// A single row of an index: one content-addressed blob.
///
/// # Invariants
///
/// - `hash` is the lowercase hex sha256 of the referenced content. For
///   [`EntryKind::Doc`] entries the content is the canonical hash of the
///   child entries (see [`crate::hash_entries`]).
/// - `id` is unique within the index that contains the entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// Hex-encoded sha256 of the referenced content.
    pub hash: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Identifier (document id, or file name within a document).
    pub id: String,
    /// Number of children (files of a document, zero for files).
    pub child_count: u32,
    /// Size in bytes of the referenced content.
    pub size: u64,
}

impl Entry {
    /// Creates a new entry.
    pub fn new(
        hash: impl Into<String>,
        kind: EntryKind,
        id: impl Into<String>,
        child_count: u32,
        size: u64,
    ) -> Self {
        Self {
            hash: hash.into(),
            kind,
            id: id.into(),
            child_count,
            size,
        }
    }

    /// Creates a file entry describing `content`.
    pub fn file(id: impl Into<String>, content: &[u8]) -> Self {
        Self::new(
            content_hash(content),
            EntryKind::File,
            id,
            0,
            content.len() as u64,
        )
    }

    /// Creates a document entry with an empty hash, to be filled by a rehash.
    pub fn doc(id: impl Into<String>) -> Self {
        Self::new(String::new(), EntryKind::Doc, id, 0, 0)
    }

    /// Returns true for document entries.
    pub fn is_doc(&self) -> bool {
        self.kind == EntryKind::Doc
    }

    /// Returns true if this file entry is the metadata blob of its document.
    pub fn is_metadata(&self) -> bool {
        self.kind == EntryKind::File && self.id.ends_with(".metadata")
    }

    /// Returns the file extension part of the id (`"pdf"` for `"abc.pdf"`).
    pub fn extension(&self) -> Option<&str> {
        self.id.rsplit_once('.').map(|(_, ext)| ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_roundtrip() {
        assert_eq!(EntryKind::File.tag(), "0");
        assert_eq!(EntryKind::Doc.tag(), "80000000");
        assert_eq!("0".parse::<EntryKind>().unwrap(), EntryKind::File);
        assert_eq!("80000000".parse::<EntryKind>().unwrap(), EntryKind::Doc);
        assert!("7".parse::<EntryKind>().is_err());
    }

    #[test]
    fn file_entry_from_content() {
        let entry = Entry::file("a.content", b"{}");
        assert_eq!(entry.size, 2);
        assert_eq!(entry.child_count, 0);
        assert_eq!(entry.hash, content_hash(b"{}"));
        assert!(!entry.is_doc());
    }

    #[test]
    fn metadata_detection() {
        assert!(Entry::file("A.metadata", b"").is_metadata());
        assert!(!Entry::file("A.content", b"").is_metadata());
        assert!(!Entry::doc("x.metadata").is_metadata());
        assert_eq!(Entry::file("A.pdf", b"").extension(), Some("pdf"));
    }
}
