//! Line-oriented index format.
//!
//! ```text
//! 3
//! <hash>:<kind>:<id>:<child_count>:<size>
//! ...
//! ```
//!
//! The first line is the schema version. Every following line describes one
//! entry, fields joined by [`DELIMITER`], entries sorted ascending by id.

use crate::entry::{Entry, EntryKind};
use crate::error::{CodecError, CodecResult};
use crate::hash::validate_hash;

/// Schema version written on the first line of every index.
pub const SCHEMA_VERSION: &str = "3";

/// Field delimiter within an entry line.
pub const DELIMITER: char = ':';

const FIELD_COUNT: usize = 5;

/// Encodes entries into the canonical index format.
///
/// Entries are sorted by id before writing, so the output only depends on the
/// entry set.
pub fn encode(entries: &[Entry]) -> Vec<u8> {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = String::with_capacity(2 + sorted.len() * 96);
    out.push_str(SCHEMA_VERSION);
    out.push('\n');
    for entry in sorted {
        out.push_str(&entry.hash);
        out.push(DELIMITER);
        out.push_str(entry.kind.tag());
        out.push(DELIMITER);
        out.push_str(&entry.id);
        out.push(DELIMITER);
        out.push_str(&entry.child_count.to_string());
        out.push(DELIMITER);
        out.push_str(&entry.size.to_string());
        out.push('\n');
    }
    out.into_bytes()
}

/// Decodes an index.
///
/// The returned entries are sorted by id.
///
/// # Errors
///
/// Returns [`CodecError::Format`] for non-UTF-8 input, a first line other
/// than [`SCHEMA_VERSION`], a wrong field count, a hash that is not hex, an
/// unknown kind tag, a non-numeric count or size, or a duplicate id.
pub fn decode(bytes: &[u8]) -> CodecResult<Vec<Entry>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CodecError::format(format!("index is not UTF-8: {e}")))?;

    let mut lines = text.lines();
    let version = lines
        .next()
        .ok_or_else(|| CodecError::format("empty index"))?;
    if version.trim_end() != SCHEMA_VERSION {
        return Err(CodecError::format(format!(
            "unsupported schema version {version:?}"
        )));
    }

    let mut entries = Vec::new();
    for (n, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        entries.push(parse_line(line, n + 2)?);
    }

    entries.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some(pair) = entries.windows(2).find(|w| w[0].id == w[1].id) {
        return Err(CodecError::format(format!(
            "duplicate entry id {:?}",
            pair[0].id
        )));
    }

    Ok(entries)
}

fn parse_line(line: &str, line_no: usize) -> CodecResult<Entry> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(CodecError::format(format!(
            "line {line_no}: expected {FIELD_COUNT} fields, found {}",
            fields.len()
        )));
    }

    let hash = fields[0];
    validate_hash(hash)?;
    let kind: EntryKind = fields[1].parse().map_err(|_| {
        CodecError::format(format!(
            "line {line_no}: unknown entry kind {:?}",
            fields[1]
        ))
    })?;
    let id = fields[2];
    if id.is_empty() {
        return Err(CodecError::format(format!("line {line_no}: empty id")));
    }
    let child_count = fields[3].parse::<u32>().map_err(|_| {
        CodecError::format(format!(
            "line {line_no}: child count {:?} is not a number",
            fields[3]
        ))
    })?;
    let size = fields[4].parse::<u64>().map_err(|_| {
        CodecError::format(format!("line {line_no}: size {:?} is not a number", fields[4]))
    })?;

    Ok(Entry::new(hash, kind, id, child_count, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::content_hash;
    use proptest::prelude::*;

    fn sample() -> Vec<Entry> {
        vec![
            Entry::file("b.metadata", b"meta"),
            Entry::file("b.content", b"{}"),
            Entry::new(content_hash(b"doc"), EntryKind::Doc, "a", 2, 6),
        ]
    }

    #[test]
    fn encode_writes_sorted_lines() {
        let encoded = String::from_utf8(encode(&sample())).unwrap();
        let lines: Vec<&str> = encoded.lines().collect();

        assert_eq!(lines[0], "3");
        assert!(lines[1].ends_with(":80000000:a:2:6"));
        assert!(lines[2].ends_with(":0:b.content:0:2"));
        assert!(lines[3].ends_with(":0:b.metadata:0:4"));
        assert!(encoded.ends_with('\n'));
    }

    #[test]
    fn encode_empty() {
        assert_eq!(encode(&[]), b"3\n");
        assert!(decode(b"3\n").unwrap().is_empty());
    }

    #[test]
    fn decode_sorts_entries() {
        let mut entries = sample();
        entries.reverse();
        let decoded = decode(&encode(&entries)).unwrap();
        let ids: Vec<&str> = decoded.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b.content", "b.metadata"]);
    }

    #[test]
    fn wrong_schema_rejected() {
        let result = decode(b"4\n");
        assert!(matches!(result, Err(CodecError::Format { .. })));
        assert!(matches!(decode(b""), Err(CodecError::Format { .. })));
    }

    #[test]
    fn wrong_field_count_rejected() {
        let index = format!("3\n{}:0:x:0\n", content_hash(b"x"));
        assert!(matches!(
            decode(index.as_bytes()),
            Err(CodecError::Format { .. })
        ));
    }

    #[test]
    fn non_numeric_fields_rejected() {
        let hash = content_hash(b"x");
        let bad_count = format!("3\n{hash}:0:x:one:0\n");
        let bad_size = format!("3\n{hash}:0:x:0:-5\n");
        assert!(matches!(
            decode(bad_count.as_bytes()),
            Err(CodecError::Format { .. })
        ));
        assert!(matches!(
            decode(bad_size.as_bytes()),
            Err(CodecError::Format { .. })
        ));
    }

    #[test]
    fn unknown_kind_and_bad_hash_rejected() {
        let hash = content_hash(b"x");
        let bad_kind = format!("3\n{hash}:5:x:0:0\n");
        assert!(matches!(
            decode(bad_kind.as_bytes()),
            Err(CodecError::Format { .. })
        ));

        let bad_hash = "3\nnothex:0:x:0:0\n";
        assert!(matches!(
            decode(bad_hash.as_bytes()),
            Err(CodecError::Format { .. })
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let hash = content_hash(b"x");
        let index = format!("3\n{hash}:0:x:0:0\n{hash}:0:x:0:0\n");
        assert!(matches!(
            decode(index.as_bytes()),
            Err(CodecError::Format { .. })
        ));
    }

    fn entry_strategy() -> impl Strategy<Value = Entry> {
        (
            prop::collection::vec(any::<u8>(), 0..64),
            prop_oneof![Just(EntryKind::File), Just(EntryKind::Doc)],
            "[A-Za-z0-9._-]{1,40}",
            any::<u32>(),
            any::<u64>(),
        )
            .prop_map(|(content, kind, id, child_count, size)| {
                Entry::new(content_hash(&content), kind, id, child_count, size)
            })
    }

    proptest! {
        #[test]
        fn roundtrip_yields_sorted_entries(
            entries in prop::collection::vec(entry_strategy(), 0..24)
        ) {
            let mut unique = entries;
            unique.sort_by(|a, b| a.id.cmp(&b.id));
            unique.dedup_by(|a, b| a.id == b.id);
            unique.reverse();

            let decoded = decode(&encode(&unique)).unwrap();
            unique.sort_by(|a, b| a.id.cmp(&b.id));
            prop_assert_eq!(decoded, unique);
        }
    }
}
