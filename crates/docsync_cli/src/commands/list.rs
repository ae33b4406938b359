//! List command implementation.

use super::{CliError, Client};
use docsync_core::Document;
use serde::Serialize;

/// One listed document.
#[derive(Debug, Serialize)]
pub struct ListedDocument {
    /// Document id.
    pub id: String,
    /// Visible name.
    pub name: String,
    /// `folder` or `document`.
    pub kind: &'static str,
    /// Metadata version.
    pub version: u32,
    /// Total size of the document's files.
    pub size: u64,
    /// Whether the document is deleted.
    pub deleted: bool,
}

impl From<&Document> for ListedDocument {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id().to_string(),
            name: doc.metadata.name.clone(),
            kind: if doc.is_collection() {
                "folder"
            } else {
                "document"
            },
            version: doc.metadata.version,
            size: doc.entry().size,
            deleted: doc.is_deleted(),
        }
    }
}

/// Runs the list command against the cached tree.
pub fn run(
    client: &Client,
    parent: &str,
    all: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let listed = collect(client, parent, all);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&listed)?),
        "text" => print_text_output(&listed),
        other => return Err(CliError::UnknownFormat(other.to_string()).into()),
    }
    Ok(())
}

fn collect(client: &Client, parent: &str, all: bool) -> Vec<ListedDocument> {
    let mut listed: Vec<ListedDocument> = if all {
        client
            .tree()
            .documents()
            .iter()
            .filter(|doc| doc.metadata.parent_id == parent)
            .map(ListedDocument::from)
            .collect()
    } else {
        client.list(parent).into_iter().map(ListedDocument::from).collect()
    };
    listed.sort_by_key(|doc| (doc.kind != "folder", doc.name.clone()));
    listed
}

fn print_text_output(listed: &[ListedDocument]) {
    if listed.is_empty() {
        println!("(empty)");
        return;
    }
    for doc in listed {
        let marker = if doc.deleted { " [deleted]" } else { "" };
        println!(
            "{:<36}  {:<8}  v{:<4} {:>10}  {}{}",
            doc.id, doc.kind, doc.version, doc.size, doc.name, marker
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_storage::LocalDirectoryStorage;
    use docsync_sync_engine::{SyncClient, SyncConfig};
    use tempfile::tempdir;

    #[test]
    fn folders_sort_first_and_deleted_are_hidden() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        let storage = LocalDirectoryStorage::open(remote.path()).unwrap();
        let config = SyncConfig::new().with_cache_path(local.path().join("tree.json"));
        let mut client = SyncClient::open(storage, config).unwrap();

        client.upload_document("Alpha", "", "pdf", b"%PDF").unwrap();
        client.create_folder("Zeta", "").unwrap();
        let gone = client.create_folder("Gone", "").unwrap();
        client.delete(&gone).unwrap();

        let visible = collect(&client, "", false);
        let names: Vec<_> = visible.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha"]);
        assert_eq!(visible[1].kind, "document");

        let all = collect(&client, "", true);
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|d| d.deleted && d.name == "Gone"));
    }
}
