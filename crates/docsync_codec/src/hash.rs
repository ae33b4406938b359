//! Canonical hashing.
//!
//! A parent hash is computed from its children by sorting them by id,
//! decoding every child hash from hex, concatenating the raw bytes and
//! taking the sha256 of the result. The empty list hashes to the sha256 of
//! zero bytes.

use crate::entry::Entry;
use crate::error::{CodecError, CodecResult};
use sha2::{Digest, Sha256};

/// Hex sha256 of zero bytes: the hash of an empty index.
pub const EMPTY_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Returns the lowercase hex sha256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Folds a list of entries into a single parent hash.
///
/// Input order does not matter: entries are sorted by id first.
///
/// # Errors
///
/// Returns [`CodecError::Format`] if any entry hash is not valid hex.
pub fn hash_entries(entries: &[Entry]) -> CodecResult<String> {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Sha256::new();
    for entry in sorted {
        let bytes = hex::decode(&entry.hash)
            .map_err(|e| CodecError::invalid_hash(&entry.hash, &e.to_string()))?;
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Checks that `hash` is a hex string.
pub fn validate_hash(hash: &str) -> CodecResult<()> {
    if hash.is_empty() {
        return Err(CodecError::invalid_hash(hash, "empty"));
    }
    if hash.len() % 2 != 0 {
        return Err(CodecError::invalid_hash(hash, "odd length"));
    }
    if !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::invalid_hash(hash, "non-hex character"));
    }
    Ok(())
}
