//! docsync CLI
//!
//! Command-line client for a docsync remote.
//!
//! # Commands
//!
//! - `sync` - Mirror the remote into the local cache
//! - `ls` - List documents under a folder
//! - `mkdir` / `put` - Create folders and upload documents
//! - `mv` / `rename` / `rm` / `purge` - Edit the tree

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docsync command-line client.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the remote
    #[arg(global = true, short, long)]
    remote: Option<PathBuf>,

    /// Cache file (defaults to DOCSYNC_CACHE_DIR or the platform cache dir)
    #[arg(global = true, short, long)]
    cache: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the remote into the local cache
    Sync,

    /// List documents under a folder
    Ls {
        /// Folder id (root if omitted)
        #[arg(short, long, default_value = "")]
        parent: String,

        /// Include deleted documents
        #[arg(short, long)]
        all: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create a folder
    Mkdir {
        /// Folder name
        name: String,

        /// Parent folder id
        #[arg(short, long, default_value = "")]
        parent: String,
    },

    /// Upload a document
    Put {
        /// File to upload (.pdf or .epub)
        file: PathBuf,

        /// Parent folder id
        #[arg(short, long, default_value = "")]
        parent: String,

        /// Visible name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Move a document under another folder
    Mv {
        /// Document id
        id: String,

        /// New parent id ("" for root, "trash" for the trash)
        parent: String,
    },

    /// Rename a document
    Rename {
        /// Document id
        id: String,

        /// New name
        name: String,
    },

    /// Delete a document
    Rm {
        /// Document id
        id: String,
    },

    /// Remove deleted documents from the remote index
    Purge,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("docsync CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("docsync core v{}", docsync_core::VERSION);
        return Ok(());
    }

    let remote = cli.remote.ok_or(commands::CliError::MissingRemote)?;
    let mut client = commands::open_client(&remote, cli.cache)?;

    match cli.command {
        Commands::Sync => commands::sync::run(&mut client)?,
        Commands::Ls {
            parent,
            all,
            format,
        } => commands::list::run(&client, &parent, all, &format)?,
        Commands::Mkdir { name, parent } => commands::edit::mkdir(&mut client, &name, &parent)?,
        Commands::Put { file, parent, name } => {
            commands::edit::put(&mut client, &file, &parent, name.as_deref())?;
        }
        Commands::Mv { id, parent } => commands::edit::mv(&mut client, &id, &parent)?,
        Commands::Rename { id, name } => commands::edit::rename(&mut client, &id, &name)?,
        Commands::Rm { id } => commands::edit::rm(&mut client, &id)?,
        Commands::Purge => commands::edit::purge(&mut client)?,
        Commands::Version => {}
    }

    Ok(())
}
