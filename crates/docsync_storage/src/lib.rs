//! # docsync Storage
//!
//! The remote blob store interface consumed by the sync engine, and its
//! backends.
//!
//! The remote is a **content-addressed blob store** with a single mutable
//! root pointer. Blobs never change once written; the root pointer is
//! replaced with compare-and-swap on a remote-assigned generation counter.
//!
//! ## Available Backends
//!
//! - [`LocalDirectoryStorage`] - blobs in a local directory, used by tests
//!   and for syncing through a shared folder
//! - [`HttpBlobStorage`] - the HTTP blob service, over any [`HttpClient`]
//!
//! ## Example
//!
//! ```rust
//! use docsync_storage::{LocalDirectoryStorage, RemoteStorage};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let storage = LocalDirectoryStorage::open(dir.path()).unwrap();
//! storage.put_blob("abcd", b"hello world").unwrap();
//! assert_eq!(storage.get_blob("abcd").unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod http;
mod local;
mod remote;

pub use error::{StorageError, StorageResult};
pub use http::{HttpBlobStorage, HttpClient, HttpResponse};
pub use local::LocalDirectoryStorage;
pub use remote::{RemoteStorage, RootPointer};
