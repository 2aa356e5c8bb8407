//! Hybrid search: weighted fusion of vector similarity and lexical scoring.
//!
//! Vector queries bypass fusion entirely (there is no text to score).
//! Text queries fan out concurrently to the vector engine and the lexical
//! engine, then fuse per id:
//!
//! ```text
//! hybrid = w * vector_score + (1 - w) * clamp(text_score / norm, 0, 1)
//! ```
//!
//! with missing scores defaulting to zero. Ids surfaced only by the lexical
//! engine are hydrated from storage so every result carries its text and
//! timestamp.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::keyword::TextSearchEngine;
use super::types::{sort_results, Document, SearchOptions, SearchQuery, SearchResult};
use super::vector::VectorSearchEngine;
use crate::error::Result;
use crate::storage::VecturaStorage;

/// The lexical half of hybrid search: same maintenance shape as the vector
/// engine, scored in a non-negative BM25-like range.
pub trait LexicalEngine: Send + Sync {
    /// Returns up to `limit` `(id, score)` pairs, best first.
    fn search(&self, query: &str, limit: usize) -> Vec<(Uuid, f32)>;

    /// Indexes a document's text (upsert by id).
    fn index_document(&mut self, id: Uuid, text: String);

    /// Removes a document; idempotent.
    fn remove_document(&mut self, id: Uuid);
}

impl LexicalEngine for TextSearchEngine {
    fn search(&self, query: &str, limit: usize) -> Vec<(Uuid, f32)> {
        TextSearchEngine::search(self, query, limit)
    }

    fn index_document(&mut self, id: Uuid, text: String) {
        TextSearchEngine::index_document(self, id, text);
    }

    fn remove_document(&mut self, id: Uuid) {
        TextSearchEngine::remove_document(self, id);
    }
}

/// Weighted-fusion search engine over a vector engine and a lexical engine.
///
/// The lexical engine is the only mutable state; it sits behind a `RwLock`
/// so searches share it while index maintenance takes it exclusively.
pub struct HybridSearchEngine<S, T = TextSearchEngine>
where
    S: VecturaStorage,
    T: LexicalEngine,
{
    vector: VectorSearchEngine,
    text: RwLock<T>,
    storage: Arc<S>,
    vector_weight: f32,
    bm25_normalization_factor: f32,
}

impl<S, T> HybridSearchEngine<S, T>
where
    S: VecturaStorage,
    T: LexicalEngine,
{
    /// Creates a hybrid engine.
    ///
    /// `vector_weight` is clamped to `[0, 1]`; `bm25_normalization_factor`
    /// is clamped to `[1e-9, ∞)` so fusion never divides by zero.
    pub fn new(
        vector: VectorSearchEngine,
        text: T,
        storage: Arc<S>,
        vector_weight: f32,
        bm25_normalization_factor: f32,
    ) -> Self {
        Self {
            vector,
            text: RwLock::new(text),
            storage,
            vector_weight: vector_weight.clamp(0.0, 1.0),
            bm25_normalization_factor: bm25_normalization_factor.max(1e-9),
        }
    }

    /// The wrapped vector engine.
    pub fn vector(&self) -> &VectorSearchEngine {
        &self.vector
    }

    /// The fusion weight actually in effect (post-clamp).
    pub fn vector_weight(&self) -> f32 {
        self.vector_weight
    }

    /// Indexes a document for lexical scoring. The vector engine holds no
    /// per-document state, so nothing else changes.
    pub async fn index_document(&self, document: &Document) {
        let mut text = self.text.write().await;
        text.index_document(document.id, document.text.clone());
    }

    /// Removes a document from the lexical index. Idempotent.
    pub async fn remove_document(&self, id: Uuid) {
        let mut text = self.text.write().await;
        text.remove_document(id);
    }

    /// Searches with hybrid scoring.
    ///
    /// Vector queries delegate entirely to the vector engine; text queries
    /// fan out to both engines and fuse.
    #[instrument(skip_all, fields(num_results = options.num_results))]
    pub async fn search(
        &self,
        query: &SearchQuery,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let query_text = match query {
            SearchQuery::Vector(_) => {
                return self.vector.search(self.storage.as_ref(), query, options).await;
            }
            SearchQuery::Text(text) => text.clone(),
        };

        let query_vector = self
            .vector
            .resolve_query_vector(&SearchQuery::Text(query_text.clone()))
            .await?;

        // Both branches fetch wide and unthresholded; the fused list is
        // filtered and truncated below.
        let wide = SearchOptions {
            num_results: options.num_results * 2,
            threshold: None,
        };

        let vector_query = SearchQuery::Vector(query_vector);
        let vector_future = self.vector.search(
            self.storage.as_ref(),
            &vector_query,
            &wide,
        );
        let text_future = async {
            let text = self.text.read().await;
            text.search(&query_text, wide.num_results)
        };

        let (vector_results, text_scores) = tokio::join!(vector_future, text_future);
        let vector_results = vector_results?;
        debug!(
            "Fusing {} vector and {} lexical hits",
            vector_results.len(),
            text_scores.len()
        );

        let mut by_id: HashMap<Uuid, SearchResult> = vector_results
            .into_iter()
            .map(|result| (result.id, result))
            .collect();
        let text_scores: HashMap<Uuid, f32> = text_scores.into_iter().collect();

        // Hydrate lexical-only hits so every fused result carries a
        // document.
        let missing: Vec<Uuid> = text_scores
            .keys()
            .filter(|id| !by_id.contains_key(*id))
            .copied()
            .collect();
        for document in self.load_documents_by_ids(&missing).await? {
            by_id.insert(
                document.id,
                SearchResult {
                    id: document.id,
                    text: document.text,
                    score: 0.0,
                    created_at: document.created_at,
                },
            );
        }

        let mut results: Vec<SearchResult> = by_id
            .into_values()
            .map(|mut result| {
                let text_score = text_scores.get(&result.id).copied().unwrap_or(0.0);
                let normalized_text =
                    (text_score / self.bm25_normalization_factor).clamp(0.0, 1.0);
                result.score = self.vector_weight * result.score
                    + (1.0 - self.vector_weight) * normalized_text;
                result
            })
            .filter(|result| match options.threshold {
                Some(threshold) => result.score >= threshold,
                None => true,
            })
            .collect();

        sort_results(&mut results);
        results.truncate(options.num_results);
        Ok(results)
    }

    /// Loads documents by id, using the indexed capability when the storage
    /// has one and filtering a full load otherwise. Ids that no longer
    /// exist are skipped.
    async fn load_documents_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(indexed) = self.storage.as_indexed() {
            let map = indexed.load_documents_by_ids(ids).await?;
            if map.len() < ids.len() {
                warn!(
                    "{} lexical hit(s) missing from storage, skipping",
                    ids.len() - map.len()
                );
            }
            return Ok(map.into_values().collect());
        }

        let wanted: std::collections::HashSet<Uuid> = ids.iter().copied().collect();
        Ok(self
            .storage
            .load_documents()
            .await?
            .into_iter()
            .filter(|d| wanted.contains(&d.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStrategy;
    use crate::embedding::HashingEmbedder;
    use crate::TextEmbedder;
    use crate::storage::InMemoryStorageProvider;

    /// Lexical double returning scripted scores regardless of the query.
    struct ScriptedLexical {
        hits: Vec<(Uuid, f32)>,
    }

    impl LexicalEngine for ScriptedLexical {
        fn search(&self, _query: &str, limit: usize) -> Vec<(Uuid, f32)> {
            self.hits.iter().take(limit).copied().collect()
        }

        fn index_document(&mut self, _id: Uuid, _text: String) {}

        fn remove_document(&mut self, _id: Uuid) {}
    }

    fn vector_engine(dimension: usize) -> VectorSearchEngine {
        VectorSearchEngine::new(
            Arc::new(HashingEmbedder::new(dimension).unwrap()),
            dimension,
            MemoryStrategy::FullMemory,
        )
    }

    async fn normalized_doc(text: &str, embedder: &HashingEmbedder) -> Document {
        let raw = embedder.embed(text).await.unwrap();
        Document::new(text.to_string(), crate::math::normalize(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_fusion_formula() {
        // One stored document whose embedding equals the query's, so the
        // vector score is exactly 1.0; the scripted lexical engine reports
        // 5.0. With w = 0.5 and norm = 10: 0.5*1.0 + 0.5*0.5 = 0.75.
        let embedder = HashingEmbedder::new(16).unwrap();
        let doc = normalized_doc("hello world", &embedder).await;

        let storage = Arc::new(InMemoryStorageProvider::new());
        storage.save_document(&doc).await.unwrap();

        let lexical = ScriptedLexical {
            hits: vec![(doc.id, 5.0)],
        };
        let engine = HybridSearchEngine::new(vector_engine(16), lexical, storage, 0.5, 10.0);

        let results = engine
            .search(
                &SearchQuery::Text("hello world".to_string()),
                &SearchOptions::new(1, None).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(
            (results[0].score - 0.75).abs() < 1e-4,
            "expected 0.75, got {}",
            results[0].score
        );
    }

    #[tokio::test]
    async fn test_vector_query_bypasses_fusion() {
        let storage = Arc::new(InMemoryStorageProvider::new());
        let doc = Document::new("east".to_string(), vec![1.0, 0.0, 0.0, 0.0]);
        storage.save_document(&doc).await.unwrap();

        // Lexical engine that would dominate if consulted.
        let lexical = ScriptedLexical {
            hits: vec![(Uuid::new_v4(), 1000.0)],
        };
        let engine = HybridSearchEngine::new(vector_engine(4), lexical, storage, 0.5, 1.0);

        let results = engine
            .search(
                &SearchQuery::Vector(vec![1.0, 0.0, 0.0, 0.0]),
                &SearchOptions::new(5, None).unwrap(),
            )
            .await
            .unwrap();

        // Pure vector result: the scripted lexical id never appears.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, doc.id);
        assert!((results[0].score - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_lexical_only_hit_is_hydrated() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let stored = normalized_doc("completely unrelated", &embedder).await;

        let storage = Arc::new(InMemoryStorageProvider::new());
        storage.save_document(&stored).await.unwrap();

        // Weight 0: only the lexical side contributes.
        let lexical = ScriptedLexical {
            hits: vec![(stored.id, 10.0)],
        };
        let engine = HybridSearchEngine::new(vector_engine(16), lexical, storage, 0.0, 10.0);

        let results = engine
            .search(
                &SearchQuery::Text("anything".to_string()),
                &SearchOptions::new(5, None).unwrap(),
            )
            .await
            .unwrap();

        let hit = results.iter().find(|r| r.id == stored.id).expect("hydrated");
        assert_eq!(hit.text, "completely unrelated");
        assert!((hit.score - 1.0).abs() < 1e-4);
        assert_eq!(hit.created_at, stored.created_at);
    }

    #[tokio::test]
    async fn test_missing_lexical_document_skipped() {
        let storage = Arc::new(InMemoryStorageProvider::new());
        let lexical = ScriptedLexical {
            hits: vec![(Uuid::new_v4(), 3.0)],
        };
        let engine = HybridSearchEngine::new(vector_engine(16), lexical, storage, 0.5, 10.0);

        let results = engine
            .search(
                &SearchQuery::Text("ghost".to_string()),
                &SearchOptions::new(5, None).unwrap(),
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_applies_to_fused_score() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let doc = normalized_doc("hello world", &embedder).await;

        let storage = Arc::new(InMemoryStorageProvider::new());
        storage.save_document(&doc).await.unwrap();

        let lexical = ScriptedLexical {
            hits: vec![(doc.id, 5.0)],
        };
        let engine = HybridSearchEngine::new(vector_engine(16), lexical, storage, 0.5, 10.0);

        // Fused score is 0.75; a 0.8 threshold drops it.
        let results = engine
            .search(
                &SearchQuery::Text("hello world".to_string()),
                &SearchOptions::new(1, Some(0.8)).unwrap(),
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_weight_and_norm_clamped() {
        let storage = Arc::new(InMemoryStorageProvider::new());
        let lexical = ScriptedLexical { hits: Vec::new() };
        let engine = HybridSearchEngine::new(vector_engine(4), lexical, storage, 7.0, -3.0);

        assert!((engine.vector_weight() - 1.0).abs() < f32::EPSILON);
        assert!(engine.bm25_normalization_factor >= 1e-9);
    }

    #[tokio::test]
    async fn test_bm25_contribution_clamped_to_one() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let doc = normalized_doc("spike", &embedder).await;

        let storage = Arc::new(InMemoryStorageProvider::new());
        storage.save_document(&doc).await.unwrap();

        // Raw lexical score far above the normalization factor: the text
        // term saturates at 1.0, keeping the fused score within [0, 1].
        let lexical = ScriptedLexical {
            hits: vec![(doc.id, 1_000.0)],
        };
        let engine = HybridSearchEngine::new(vector_engine(16), lexical, storage, 0.5, 10.0);

        let results = engine
            .search(
                &SearchQuery::Text("spike".to_string()),
                &SearchOptions::new(1, None).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score <= 1.0 + 1e-6);
    }

    #[tokio::test]
    async fn test_end_to_end_with_real_lexical_engine() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let rust = normalized_doc("rust memory safety", &embedder).await;
        let cooking = normalized_doc("sourdough starter care", &embedder).await;

        let storage = Arc::new(InMemoryStorageProvider::new());
        storage
            .save_documents(&[rust.clone(), cooking.clone()])
            .await
            .unwrap();

        let engine = HybridSearchEngine::new(
            vector_engine(32),
            TextSearchEngine::new(),
            storage,
            0.5,
            10.0,
        );
        engine.index_document(&rust).await;
        engine.index_document(&cooking).await;

        let results = engine
            .search(
                &SearchQuery::Text("rust memory safety".to_string()),
                &SearchOptions::new(2, None).unwrap(),
            )
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].id, rust.id);
    }
}
