//! # docsync Core
//!
//! The local data model of docsync: documents, the hash tree that indexes
//! them, and the on-disk cache of that tree.
//!
//! ## Model
//!
//! ```text
//! HashTree (root index, generation)
//! └─ Document (doc entry)          hash = H(files)
//!    ├─ <id>.content               content descriptor
//!    ├─ <id>.metadata              metadata blob
//!    ├─ <id>.pagedata
//!    └─ <id>.pdf | <id>.epub ...   payload
//! ```
//!
//! Every level hashes its children with the canonical rule of
//! [`docsync_codec::hash_entries`], so two trees are equal exactly when their
//! root hashes are.
//!
//! ## Example
//!
//! ```rust
//! use docsync_core::{Document, HashTree};
//!
//! let mut tree = HashTree::new();
//! let folder = Document::new_collection("f1", "Books", "").unwrap();
//! tree.add(folder).unwrap();
//! assert_eq!(tree.children_of("").count(), 1);
//! tree.verify().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod document;
mod error;
mod metadata;
mod tree;

pub use cache::{CacheStore, CACHE_DIR_ENV, CACHE_FILE};
pub use document::{new_document_id, Document, CONTENT_SUFFIX, METADATA_SUFFIX, PAGEDATA_SUFFIX};
pub use error::{CoreError, CoreResult};
pub use metadata::{DocType, Metadata, ROOT_PARENT, TRASH_PARENT};
pub use tree::{HashTree, CACHE_VERSION};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
