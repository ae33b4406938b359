//! # docsync Sync Engine
//!
//! Keeps a cached [`docsync_core::HashTree`] consistent with a remote
//! content-addressed blob store.
//!
//! This crate provides:
//! - [`Mirror`]: pull reconciliation with change-only refetch
//! - [`CommitProtocol`]: read-modify-commit with generation-based
//!   compare-and-swap, conflict mirror and replay
//! - [`SyncClient`]: the operations built on top (create, upload, rename,
//!   move, delete, purge, list)
//! - [`SyncConfig`]: worker count, attempt budget and cache location
//!
//! ## Key Invariants
//!
//! - A mirror either installs the complete remote state or nothing
//! - A failed upload or root swap never advances the local cache
//! - Mutation errors are returned as-is and never retried
//! - At most one commit wins per remote generation; the others rebase
//!
//! ## Concurrency
//!
//! The engine API is synchronous. The only parallelism is inside
//! [`Mirror`], which fetches changed documents on a fixed pool of scoped
//! threads.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod commit;
mod config;
mod error;
mod mirror;

pub use client::SyncClient;
pub use commit::{CommitProtocol, CommitReport, CommitState};
pub use config::{
    SyncConfig, CONCURRENCY_ENV, DEFAULT_CONCURRENCY, DEFAULT_MAX_COMMIT_ATTEMPTS,
    MAX_ATTEMPTS_ENV,
};
pub use error::{SyncError, SyncResult};
pub use mirror::{Mirror, MirrorReport};
