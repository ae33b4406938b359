//! Benchmark utilities.

use docsync_codec::Entry;
use docsync_core::{Document, HashTree};

/// Generates deterministic payload bytes of the given size.
pub fn payload(seed: usize, size: usize) -> Vec<u8> {
    (0..size).map(|i| (i.wrapping_mul(31) ^ seed) as u8).collect()
}

/// Generates `count` file entries with distinct ids and hashes.
pub fn file_entries(count: usize) -> Vec<Entry> {
    (0..count)
        .map(|i| Entry::file(format!("file-{i:06}.pdf"), &payload(i, 64)))
        .collect()
}

/// Builds a tree of `count` top-level documents with `size`-byte payloads.
pub fn document_tree(count: usize, size: usize) -> HashTree {
    let mut tree = HashTree::new();
    for i in 0..count {
        let id = format!("doc-{i:06}");
        let doc = Document::new_document(id, format!("Document {i}"), "", "pdf", payload(i, size))
            .expect("Failed to build document");
        tree.add(doc).expect("Failed to add document");
    }
    tree
}
