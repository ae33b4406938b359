//! # docsync Codec
//!
//! Canonical index format and Merkle hashing for docsync.
//!
//! The remote store is content addressed: every blob is named by the sha256
//! of its content. Documents and the root of the tree are stored as *index*
//! blobs listing their children. This crate provides:
//!
//! - [`Entry`], one row of an index
//! - [`encode`] / [`decode`] for the line-oriented index format
//! - [`hash_entries`], which folds a list of entries into their parent hash
//!
//! ## Canonical Form
//!
//! - Entries are sorted ascending by id before hashing or writing
//! - A parent hash is the sha256 of the concatenated raw child hashes
//! - The same entry set always yields the same bytes and the same hash
//!
//! ## Usage
//!
//! ```
//! use docsync_codec::{decode, encode, hash_entries, Entry};
//!
//! let entries = vec![
//!     Entry::file("doc.metadata", b"{}"),
//!     Entry::file("doc.content", b"{}"),
//! ];
//! let bytes = encode(&entries);
//! let decoded = decode(&bytes).unwrap();
//! assert_eq!(decoded[0].id, "doc.content");
//! assert_eq!(hash_entries(&entries).unwrap(), hash_entries(&decoded).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod error;
mod hash;
mod index;

pub use entry::{Entry, EntryKind, DOC_KIND_TAG, FILE_KIND_TAG};
pub use error::{CodecError, CodecResult};
pub use hash::{content_hash, hash_entries, validate_hash, EMPTY_HASH};
pub use index::{decode, encode, DELIMITER, SCHEMA_VERSION};
