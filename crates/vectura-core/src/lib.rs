//! # Vectura Core
//!
//! An embeddable vector database: documents (text plus a dense f32
//! embedding) are inserted, persisted, and retrieved by similarity to a
//! query, with an optional hybrid of vector similarity and BM25 lexical
//! scoring.
//!
//! Two retrieval regimes sit behind one search API:
//!
//! - **Full memory** — every search loads the corpus and scores it exactly
//!   with a single batched matrix–vector product.
//! - **Indexed** — the storage layer supplies a candidate shortlist, the
//!   engine loads just those documents in bounded concurrent batches and
//!   re-ranks them exactly.
//!
//! The [`MemoryStrategy`](config::MemoryStrategy) picks between them, per
//! search, by corpus size.
//!
//! ## Modules
//!
//! - [`db`] - [`VecturaDatabase`](db::VecturaDatabase), the lifecycle and
//!   search orchestrator
//! - [`search`] - vector, lexical, and hybrid engines plus shared types
//! - [`storage`] - storage contracts, file-backed and in-memory providers
//! - [`embedding`] - the embedder seam and a deterministic test embedder
//! - [`config`] - database configuration and the memory strategy
//! - [`math`] - normalization and batched cosine similarity
//! - [`error`] - the error taxonomy
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vectura_core::{
//!     HashingEmbedder, InMemoryStorageProvider, SearchQuery, VecturaConfig, VecturaDatabase,
//! };
//!
//! let config = VecturaConfig::new("notes").with_dimension(384);
//! let embedder = Arc::new(HashingEmbedder::new(384)?);
//! let db = VecturaDatabase::open(config, embedder, InMemoryStorageProvider::new()).await?;
//!
//! let id = db.add_document("Rust is a systems language".to_string(), None).await?;
//! let hits = db.search(SearchQuery::Text("systems language".into()), Some(5), None).await?;
//! assert_eq!(hits[0].id, id);
//! ```

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod math;
pub mod search;
pub mod storage;

pub use config::{MemoryStrategy, SearchConfig, VecturaConfig};
pub use db::VecturaDatabase;
pub use embedding::{HashingEmbedder, TextEmbedder};
pub use error::{Result, VecturaError};
pub use search::{Document, SearchOptions, SearchQuery, SearchResult};
pub use storage::{
    FileStorageProvider, IndexedStorage, InMemoryStorageProvider, VecturaStorage,
};
