//! Sync command implementation.

use super::Client;

/// Runs the sync command.
pub fn run(client: &mut Client) -> Result<(), Box<dyn std::error::Error>> {
    let report = client.mirror()?;
    if report.up_to_date {
        println!("Up to date (generation {})", report.generation);
    } else {
        println!("Synced generation {}", report.generation);
        println!("  Added:   {}", report.added);
        println!("  Changed: {}", report.changed);
        println!("  Removed: {}", report.removed);
        println!("  Kept:    {}", report.kept);
        println!("  Fetched: {} blobs", report.fetched);
    }
    Ok(())
}
