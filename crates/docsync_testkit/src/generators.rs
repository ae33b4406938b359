//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entries and documents that satisfy
//! the index invariants (hex hashes, unique ids).

use docsync_codec::{Entry, EntryKind};
use docsync_core::{Document, HashTree};
use proptest::prelude::*;

/// Strategy for lowercase hex sha256 hashes.
pub fn hash_strategy() -> impl Strategy<Value = String> {
    prop::array::uniform32(any::<u8>())
        .prop_map(|bytes| bytes.iter().map(|b| format!("{b:02x}")).collect())
}

/// Strategy for entry ids that contain no delimiter or newline.
pub fn entry_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_-]{1,12}(\\.[a-z]{1,8})?").expect("Invalid regex")
}

/// Strategy for a single entry of either kind.
pub fn entry_strategy() -> impl Strategy<Value = Entry> {
    (
        hash_strategy(),
        prop_oneof![Just(EntryKind::File), Just(EntryKind::Doc)],
        entry_id_strategy(),
        any::<u32>(),
        any::<u64>(),
    )
        .prop_map(|(hash, kind, id, child_count, size)| {
            Entry::new(hash, kind, id, child_count, size)
        })
}

/// Strategy for an entry list with unique ids, in arbitrary order.
pub fn entry_list_strategy(max: usize) -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::btree_map(entry_id_strategy(), entry_strategy(), 0..=max).prop_flat_map(
        |by_id| {
            let entries: Vec<Entry> = by_id
                .into_iter()
                .map(|(id, mut entry)| {
                    entry.id = id;
                    entry
                })
                .collect();
            Just(entries).prop_shuffle()
        },
    )
}

/// Strategy for staged documents holding arbitrary payloads.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    (
        prop::string::string_regex("[a-f0-9]{8}").expect("Invalid regex"),
        prop::string::string_regex("[A-Za-z ]{1,16}").expect("Invalid regex"),
        prop_oneof![Just("pdf"), Just("epub")],
        prop::collection::vec(any::<u8>(), 0..256),
    )
        .prop_map(|(id, name, ext, payload)| {
            Document::new_document(id, name, "", ext, payload).expect("Failed to build document")
        })
}

/// Strategy for trees of up to `max` top-level documents.
pub fn tree_strategy(max: usize) -> impl Strategy<Value = HashTree> {
    prop::collection::vec(document_strategy(), 0..=max).prop_map(|docs| {
        let mut tree = HashTree::new();
        for doc in docs {
            tree.add(doc).expect("Failed to add document");
        }
        tree
    })
}
