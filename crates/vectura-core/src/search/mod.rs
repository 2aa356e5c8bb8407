//! Search engines and their shared types.
//!
//! - `types`: documents, queries, options, results
//! - `vector`: strategy-routed exact vector search
//! - `keyword`: BM25 lexical search
//! - `hybrid`: weighted fusion of the two

pub mod types;

mod hybrid;
mod keyword;
mod vector;

pub use hybrid::{HybridSearchEngine, LexicalEngine};
pub use keyword::TextSearchEngine;
pub use types::{Document, SearchOptions, SearchQuery, SearchResult};
pub use vector::VectorSearchEngine;
