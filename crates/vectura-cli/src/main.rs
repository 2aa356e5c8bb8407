//! Vectura CLI - command-line front end for the vectura vector database.
//!
//! # Usage
//!
//! ```bash
//! # Add documents
//! vectura add "Rust is a systems programming language"
//!
//! # Search (hybrid vector + keyword)
//! vectura search "systems language" -n 5
//!
//! # Lifecycle
//! vectura update <id> "new text"
//! vectura delete <id>
//! vectura reset
//! vectura stats
//! ```
//!
//! Documents are stored under the user documents directory
//! (`VecturaKit/<db-name>/`) unless `--dir` points elsewhere. Embeddings
//! come from the built-in deterministic hashing embedder; wire a
//! model-backed [`vectura_core::TextEmbedder`] in for real deployments.

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use vectura_core::{HashingEmbedder, SearchQuery, VecturaConfig, VecturaDatabase};

/// Embedding dimension for the built-in hashing embedder.
const DIMENSION: usize = 256;

/// Vectura vector database CLI.
#[derive(Parser)]
#[command(name = "vectura", version, about)]
struct Cli {
    /// Database name (storage subdirectory)
    #[arg(long, default_value = "default")]
    db: String,

    /// Custom storage root (default: user documents directory)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a document
    Add {
        /// Document text
        text: String,

        /// Reuse an existing id (upsert)
        #[arg(long)]
        id: Option<Uuid>,
    },

    /// Search for documents
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Minimum score in [0, 1]
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a document's text, keeping its id and timestamp
    Update {
        /// Document id
        id: Uuid,

        /// Replacement text
        text: String,
    },

    /// Delete documents by id
    Delete {
        /// Document ids
        ids: Vec<Uuid>,
    },

    /// Delete every document
    Reset,

    /// Show document count and storage location
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = {
        let mut config = VecturaConfig::new(cli.db.clone()).with_dimension(DIMENSION);
        config.directory = cli.dir.clone();
        config
    };
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION)?);

    let db = VecturaDatabase::open_with_file_storage(config, embedder)
        .await
        .context("Failed to open database")?;

    match cli.command {
        Commands::Add { text, id } => {
            let id = db.add_document(text, id).await?;
            println!("{id}");
        }
        Commands::Search {
            query,
            limit,
            threshold,
            json,
        } => {
            let results = db
                .search(SearchQuery::Text(query.clone()), Some(limit), threshold)
                .await?;
            let rendered = if json {
                output::format_json(&results)?
            } else {
                output::format_human(&query, &results)
            };
            println!("{rendered}");
        }
        Commands::Update { id, text } => {
            db.update_document(id, text).await?;
            println!("updated {id}");
        }
        Commands::Delete { ids } => {
            db.delete_documents(&ids).await?;
            println!("deleted {} document(s)", ids.len());
        }
        Commands::Reset => {
            let count = db.document_count().await?;
            db.reset().await?;
            println!("deleted {count} document(s)");
        }
        Commands::Stats => {
            let count = db.document_count().await?;
            println!("database:  {}", cli.db);
            println!("location:  {}", db.storage().directory().display());
            println!("documents: {count}");
        }
    }

    Ok(())
}
