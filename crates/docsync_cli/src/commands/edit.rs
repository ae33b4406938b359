//! Commands that change the tree.

use super::{CliError, Client};
use std::path::Path;

/// Creates a folder and prints its id.
pub fn mkdir(client: &mut Client, name: &str, parent: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = client.create_folder(name, parent)?;
    println!("{id}");
    Ok(())
}

/// Uploads a file and prints the new document id.
pub fn put(
    client: &mut Client,
    file: &Path,
    parent: &str,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ext = upload_extension(file)?;
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| ext.clone()),
    };
    let payload = std::fs::read(file)?;
    let id = client.upload_document(&name, parent, &ext, &payload)?;
    println!("{id}");
    Ok(())
}

/// Moves a document.
pub fn mv(client: &mut Client, id: &str, parent: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = client.move_to(id, parent)?;
    println!("Moved {id} (generation {})", report.generation);
    Ok(())
}

/// Renames a document.
pub fn rename(client: &mut Client, id: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = client.rename(id, name)?;
    println!("Renamed {id} (generation {})", report.generation);
    Ok(())
}

/// Deletes a document.
pub fn rm(client: &mut Client, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = client.delete(id)?;
    println!("Deleted {id} (generation {})", report.generation);
    Ok(())
}

/// Purges deleted documents.
pub fn purge(client: &mut Client) -> Result<(), Box<dyn std::error::Error>> {
    let purged = client.purge_deleted()?;
    if purged.is_empty() {
        println!("Nothing to purge");
    }
    for id in purged {
        println!("Purged {id}");
    }
    Ok(())
}

fn upload_extension(file: &Path) -> Result<String, CliError> {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("epub") => {
            Ok(ext.to_ascii_lowercase())
        }
        _ => Err(CliError::UnsupportedFile {
            path: file.to_path_buf(),
        }),
    }
}
