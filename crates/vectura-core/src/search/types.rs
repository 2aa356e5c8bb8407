//! Core value types: documents, queries, options, and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VecturaError};

/// A stored document: text plus its pre-normalized embedding.
///
/// Documents are immutable by value. Updates produce a new `Document` with
/// the same `id` and the original `created_at` (see
/// [`Document::with_text`]). Every persisted embedding is L2-normalized
/// (`‖v‖₂ = 1 ± 1e-5`); normalization happens exactly once, at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: Uuid,
    /// The document's text content.
    pub text: String,
    /// L2-normalized embedding, length equal to the database dimension.
    pub embedding: Vec<f32>,
    /// Creation instant; preserved across updates.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Creates a document with a fresh id and creation timestamp.
    ///
    /// The embedding is stored as supplied; the orchestrator normalizes
    /// before constructing documents.
    pub fn new(text: String, embedding: Vec<f32>) -> Self {
        Self::with_id(Uuid::new_v4(), text, embedding)
    }

    /// Creates a document with a caller-supplied id.
    pub fn with_id(id: Uuid, text: String, embedding: Vec<f32>) -> Self {
        Self {
            id,
            text,
            embedding,
            created_at: Utc::now(),
        }
    }

    /// Produces the updated form of this document: new text and embedding,
    /// same `id`, original `created_at`.
    pub fn with_text(&self, text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: self.id,
            text,
            embedding,
            created_at: self.created_at,
        }
    }
}

/// A search query: either a raw vector or text to be embedded.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    /// Query by vector. Validated against the database dimension at the
    /// orchestrator boundary.
    Vector(Vec<f32>),
    /// Query by text; embedded by the configured embedder.
    Text(String),
}

/// Options controlling a single search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of results to return.
    pub num_results: usize,
    /// Minimum score for a result to be included, if set. Must lie in
    /// `[0, 1]`.
    pub threshold: Option<f32>,
}

impl SearchOptions {
    /// Creates validated search options.
    ///
    /// # Errors
    ///
    /// Returns [`VecturaError::InvalidInput`] if `num_results` is zero or
    /// the threshold lies outside `[0, 1]`.
    pub fn new(num_results: usize, threshold: Option<f32>) -> Result<Self> {
        if num_results == 0 {
            return Err(VecturaError::InvalidInput(
                "num_results must be at least 1".to_string(),
            ));
        }
        if let Some(t) = threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(VecturaError::InvalidInput(format!(
                    "threshold must lie in [0, 1], got {t}"
                )));
            }
        }
        Ok(Self {
            num_results,
            threshold,
        })
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            num_results: 10,
            threshold: None,
        }
    }
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the matching document.
    pub id: Uuid,
    /// The document's text.
    pub text: String,
    /// Relevance score: exact cosine similarity for vector search, the
    /// fused value for hybrid search.
    pub score: f32,
    /// The document's creation instant.
    pub created_at: DateTime<Utc>,
}

/// Sorts results descending by score, ties broken by ascending id so that
/// equal-score orderings are deterministic.
pub(crate) fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
