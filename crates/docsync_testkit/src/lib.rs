//! # docsync Testkit
//!
//! Test utilities for docsync.
//!
//! This crate provides:
//! - Temporary remotes and cache locations
//! - A storage wrapper that counts calls and injects failures
//! - An in-process blob service for the HTTP storage backend
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use docsync_storage::RemoteStorage;
//! use docsync_testkit::{RecordingStorage, TestRemote};
//!
//! let remote = TestRemote::new();
//! let storage = RecordingStorage::new(remote.storage());
//! storage.fail_next_cas(1);
//! assert!(storage.cas_root("aa", 0).is_err());
//! assert!(storage.cas_root("aa", 0).is_ok());
//! assert_eq!(storage.counts().cas_root, 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod loopback;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::loopback::*;
    pub use crate::recording::*;
}

pub use fixtures::*;
pub use generators::*;
pub use loopback::*;
pub use recording::*;
