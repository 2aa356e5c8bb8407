//! Exact vector search with strategy-routed candidate sourcing.
//!
//! The engine turns a query into a ranked result list in one of two ways:
//!
//! - **Full memory**: load every document and score the whole corpus with a
//!   single batched matrix–vector product.
//! - **Indexed**: ask the storage layer for a candidate shortlist, load just
//!   those documents in bounded concurrent batches, and re-rank them with
//!   the same exact product.
//!
//! Both paths produce exact cosine scores; the indexed path only narrows
//! which documents get scored. The engine holds no state over storage — the
//! provider is handed in per call.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::MemoryStrategy;
use crate::embedding::TextEmbedder;
use crate::error::{validate_dimension, Result, VecturaError};
use crate::math::{batched_cosine, normalize};
use crate::search::types::{sort_results, Document, SearchOptions, SearchQuery, SearchResult};
use crate::storage::{IndexedStorage, VecturaStorage};

/// Knobs for the indexed path, extracted from the strategy.
#[derive(Debug, Clone, Copy)]
struct BatchParams {
    candidate_multiplier: usize,
    batch_size: usize,
    max_concurrent_batches: usize,
}

/// Strategy-routing exact search engine.
pub struct VectorSearchEngine {
    embedder: Arc<dyn TextEmbedder>,
    dimension: usize,
    strategy: MemoryStrategy,
}

impl VectorSearchEngine {
    /// Creates an engine for a fixed dimension and strategy.
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        dimension: usize,
        strategy: MemoryStrategy,
    ) -> Self {
        Self {
            embedder,
            dimension,
            strategy,
        }
    }

    /// The embedder used for text queries.
    pub fn embedder(&self) -> &Arc<dyn TextEmbedder> {
        &self.embedder
    }

    /// The dimension every queried or stored vector must match.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Resolves a query to a normalized vector: validates supplied vectors
    /// against the database dimension, embeds text queries.
    pub async fn resolve_query_vector(&self, query: &SearchQuery) -> Result<Vec<f32>> {
        let raw = match query {
            SearchQuery::Vector(v) => {
                validate_dimension(self.dimension, v.len())?;
                v.clone()
            }
            SearchQuery::Text(text) => {
                let embedded = self.embedder.embed(text).await?;
                validate_dimension(self.dimension, embedded.len())?;
                embedded
            }
        };
        normalize(&raw)
    }

    /// Searches storage for the documents most similar to the query.
    #[instrument(skip_all, fields(num_results = options.num_results))]
    pub async fn search<S>(
        &self,
        storage: &S,
        query: &SearchQuery,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>>
    where
        S: VecturaStorage + ?Sized,
    {
        let query_vector = self.resolve_query_vector(query).await?;

        let params = self.indexed_params(storage).await?;
        match (params, storage.as_indexed()) {
            (Some(params), Some(indexed)) => {
                self.search_indexed(storage, indexed, &query_vector, options, params)
                    .await
            }
            _ => self.search_full_memory(storage, &query_vector, options).await,
        }
    }

    /// Decides whether this search takes the indexed path, and with which
    /// parameters. `None` means brute force.
    async fn indexed_params<S>(&self, storage: &S) -> Result<Option<BatchParams>>
    where
        S: VecturaStorage + ?Sized,
    {
        match self.strategy {
            MemoryStrategy::FullMemory => Ok(None),
            MemoryStrategy::Indexed {
                candidate_multiplier,
                batch_size,
                max_concurrent_batches,
            } => Ok(Some(BatchParams {
                candidate_multiplier,
                batch_size,
                max_concurrent_batches,
            })),
            MemoryStrategy::Automatic {
                threshold,
                candidate_multiplier,
                batch_size,
                max_concurrent_batches,
            } => {
                let count = storage.total_document_count().await?;
                if count >= threshold {
                    Ok(Some(BatchParams {
                        candidate_multiplier,
                        batch_size,
                        max_concurrent_batches,
                    }))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Brute-force path: score the entire corpus exactly.
    async fn search_full_memory<S>(
        &self,
        storage: &S,
        query_vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>>
    where
        S: VecturaStorage + ?Sized,
    {
        let documents = storage.load_documents().await?;
        debug!("Scoring {} documents in memory", documents.len());
        self.rank_exact(documents, query_vector, options)
    }

    /// Indexed path: candidate shortlist from storage, batched load, exact
    /// re-rank over the loaded subset.
    async fn search_indexed<S>(
        &self,
        storage: &S,
        indexed: &dyn IndexedStorage,
        query_vector: &[f32],
        options: &SearchOptions,
        params: BatchParams,
    ) -> Result<Vec<SearchResult>>
    where
        S: VecturaStorage + ?Sized,
    {
        let prefilter_size = options.num_results * params.candidate_multiplier;

        let candidate_ids = match indexed
            .search_vector_candidates(query_vector, options.num_results, prefilter_size)
            .await?
        {
            Some(ids) => ids,
            None => {
                // No index behind this storage: derive the shortlist from a
                // full exact pass, wide enough to re-rank from.
                debug!("No candidate index; falling back to full scan");
                let shortlist_options = SearchOptions {
                    num_results: prefilter_size,
                    threshold: None,
                };
                self.search_full_memory(storage, query_vector, &shortlist_options)
                    .await?
                    .into_iter()
                    .map(|r| r.id)
                    .collect()
            }
        };

        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let loaded = load_candidates_batched(
            indexed,
            &candidate_ids,
            params.batch_size,
            params.max_concurrent_batches,
        )
        .await?;

        let documents: Vec<Document> = loaded.into_values().collect();
        self.rank_exact(documents, query_vector, options)
    }

    /// Exact ranking over a document set: validate dimensions, one batched
    /// cosine product, threshold, sort, truncate.
    fn rank_exact(
        &self,
        documents: Vec<Document>,
        query_vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let dimension = query_vector.len();
        for document in &documents {
            validate_dimension(dimension, document.embedding.len())?;
        }

        let mut matrix = Vec::with_capacity(documents.len() * dimension);
        for document in &documents {
            matrix.extend_from_slice(&document.embedding);
        }

        let scores = batched_cosine(&matrix, query_vector, documents.len(), dimension)?;

        let mut results: Vec<SearchResult> = documents
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| match options.threshold {
                Some(threshold) => *score >= threshold,
                None => true,
            })
            .map(|(document, score)| SearchResult {
                id: document.id,
                text: document.text,
                score,
                created_at: document.created_at,
            })
            .collect();

        sort_results(&mut results);
        results.truncate(options.num_results);
        Ok(results)
    }
}

/// Loads candidate documents in consecutive chunks of `batch_size`,
/// `max_concurrent_batches` chunks in flight per round.
///
/// Per-batch failures are collected without cancelling the rest of the
/// round; the load only fails — with [`VecturaError::LoadFailed`] — when
/// every batch failed and nothing at all was loaded. On id collisions across
/// batches the later batch wins.
async fn load_candidates_batched(
    indexed: &dyn IndexedStorage,
    ids: &[Uuid],
    batch_size: usize,
    max_concurrent_batches: usize,
) -> Result<HashMap<Uuid, Document>> {
    if ids.len() <= batch_size {
        return indexed.load_documents_by_ids(ids).await;
    }

    let chunks: Vec<&[Uuid]> = ids.chunks(batch_size).collect();
    let mut all_documents: HashMap<Uuid, Document> = HashMap::with_capacity(ids.len());
    let mut failed_batches = 0usize;

    for round in chunks.chunks(max_concurrent_batches) {
        let round_futures: Vec<_> = round
            .iter()
            .map(|chunk| indexed.load_documents_by_ids(chunk))
            .collect();

        // The whole round completes (successes and failures both) before
        // the next round starts.
        for outcome in futures::future::join_all(round_futures).await {
            match outcome {
                Ok(batch) => {
                    for (id, document) in batch {
                        all_documents.insert(id, document);
                    }
                }
                Err(e) => {
                    failed_batches += 1;
                    warn!("Candidate batch load failed: {e}");
                }
            }
        }
    }

    if all_documents.is_empty() && failed_batches > 0 {
        return Err(VecturaError::LoadFailed(format!(
            "Failed to load any candidate documents ({failed_batches} batch(es) failed)"
        )));
    }

    debug!(
        "Loaded {} candidate documents ({} batch(es) failed)",
        all_documents.len(),
        failed_batches
    );
    Ok(all_documents)
}
