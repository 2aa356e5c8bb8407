//! The database orchestrator: document lifecycle plus unified search.
//!
//! [`VecturaDatabase`] ties the pieces together: it validates input at the
//! boundary, normalizes embeddings exactly once (at write time), persists
//! through a [`VecturaStorage`] provider, and keeps the hybrid engine's
//! lexical index in step with storage.
//!
//! Mutations (add, update, delete, reset) are serialized behind a single
//! write lock — at most one is in flight at a time. Searches take no lock
//! and may run concurrently with each other and with mutations. Every
//! public operation is async and honors cooperative cancellation at its
//! await points; documents are always persisted before they are indexed, so
//! cancellation can leave at most an unindexed (but well-formed) document
//! behind.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::VecturaConfig;
use crate::embedding::TextEmbedder;
use crate::error::{validate_dimension, Result, VecturaError};
use crate::math::normalize;
use crate::search::types::{Document, SearchOptions, SearchQuery, SearchResult};
use crate::search::{HybridSearchEngine, TextSearchEngine, VectorSearchEngine};
use crate::storage::VecturaStorage;

/// An embeddable vector database over a storage provider and an embedder.
pub struct VecturaDatabase<S: VecturaStorage> {
    config: VecturaConfig,
    storage: Arc<S>,
    engine: HybridSearchEngine<S>,
    embedder: Arc<dyn TextEmbedder>,
    dimension: usize,
    /// Serializes mutating operations (single-writer, many-reader).
    write_lock: Mutex<()>,
}

impl<S: VecturaStorage> VecturaDatabase<S> {
    /// Opens a database: validates the configuration, resolves the
    /// dimension (explicit config value first, then the embedder's), boots
    /// the storage directory, and warm-loads the lexical index from the
    /// persisted corpus.
    pub async fn open(
        config: VecturaConfig,
        embedder: Arc<dyn TextEmbedder>,
        storage: S,
    ) -> Result<Self> {
        config.validate()?;

        let dimension = match config.dimension {
            Some(dimension) => dimension,
            None => embedder.dimension().await?,
        };
        if dimension == 0 {
            return Err(VecturaError::InvalidInput(
                "embedder reported a zero dimension".to_string(),
            ));
        }

        let storage = Arc::new(storage);
        storage.create_storage_directory_if_needed().await?;

        // Rebuild the lexical index from what is already on disk so text
        // scoring survives restarts.
        let existing = storage.load_documents().await?;
        let mut text_engine = TextSearchEngine::new();
        if !existing.is_empty() {
            info!("Warm-loading lexical index with {} documents", existing.len());
            text_engine.rebuild_from(existing.into_iter().map(|d| (d.id, d.text)));
        }

        let vector_engine = VectorSearchEngine::new(
            Arc::clone(&embedder),
            dimension,
            config.memory_strategy.clone(),
        );
        let engine = HybridSearchEngine::new(
            vector_engine,
            text_engine,
            Arc::clone(&storage),
            config.search.hybrid_weight,
            config.search.bm25_normalization_factor,
        );

        Ok(Self {
            config,
            storage,
            engine,
            embedder,
            dimension,
            write_lock: Mutex::new(()),
        })
    }

    /// The dimension every stored and queried vector must match.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The storage provider behind this database.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// The configuration this database was opened with.
    pub fn config(&self) -> &VecturaConfig {
        &self.config
    }
}

impl VecturaDatabase<crate::storage::FileStorageProvider> {
    /// Opens a file-backed database at the configured location:
    /// `<directory>/<name>/`, defaulting to the user documents directory.
    pub async fn open_with_file_storage(
        config: VecturaConfig,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self> {
        let storage =
            crate::storage::FileStorageProvider::new(config.directory.clone(), &config.name);
        Self::open(config, embedder, storage).await
    }
}

impl<S: VecturaStorage> VecturaDatabase<S> {
    /// Adds a single document; returns its id.
    pub async fn add_document(&self, text: String, id: Option<Uuid>) -> Result<Uuid> {
        let ids = self.add_documents(vec![text], id.map(|i| vec![i])).await?;
        // add_documents returns exactly one id per input text.
        Ok(ids[0])
    }

    /// Adds a batch of documents; returns their ids in input order.
    ///
    /// The embedder is called once for the whole batch. Each embedding is
    /// dimension-validated and normalized before its document is created;
    /// documents are persisted first and indexed after, so anything a
    /// search can see is already durable.
    ///
    /// # Errors
    ///
    /// [`VecturaError::InvalidInput`] on an empty batch, whitespace-only
    /// text, an id list whose length differs from the text list, or an
    /// embedder returning the wrong number of embeddings.
    #[instrument(skip_all, fields(batch = texts.len()))]
    pub async fn add_documents(
        &self,
        texts: Vec<String>,
        ids: Option<Vec<Uuid>>,
    ) -> Result<Vec<Uuid>> {
        let _guard = self.write_lock.lock().await;

        if texts.is_empty() {
            return Err(VecturaError::InvalidInput(
                "Cannot add an empty batch of documents".to_string(),
            ));
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(VecturaError::InvalidInput(
                "Document text must contain at least one non-whitespace character".to_string(),
            ));
        }
        if let Some(ids) = &ids {
            if ids.len() != texts.len() {
                return Err(VecturaError::InvalidInput(format!(
                    "Got {} ids for {} texts",
                    ids.len(),
                    texts.len()
                )));
            }
        }

        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(VecturaError::InvalidInput(format!(
                "Embedder returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        let ids = ids.unwrap_or_else(|| texts.iter().map(|_| Uuid::new_v4()).collect());

        let mut documents = Vec::with_capacity(texts.len());
        for ((text, embedding), id) in texts.into_iter().zip(embeddings).zip(ids.iter()) {
            validate_dimension(self.dimension, embedding.len())?;
            let normalized = normalize(&embedding)?;
            documents.push(Document::with_id(*id, text, normalized));
        }

        self.storage.save_documents(&documents).await?;
        for document in &documents {
            self.engine.index_document(document).await;
        }

        debug!("Added {} documents", documents.len());
        Ok(ids)
    }

    /// Searches the database.
    ///
    /// `num_results` and `threshold` default from the configuration when
    /// omitted. Vector queries are validated against the database
    /// dimension; text queries are embedded.
    pub async fn search(
        &self,
        query: SearchQuery,
        num_results: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let options = SearchOptions::new(
            num_results.unwrap_or(self.config.search.default_num_results),
            threshold.or(self.config.search.min_threshold),
        )?;
        self.engine.search(&query, &options).await
    }

    /// Searches with fully explicit options.
    pub async fn search_with_options(
        &self,
        query: SearchQuery,
        options: SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        self.engine.search(&query, &options).await
    }

    /// Replaces a document's text (and therefore its embedding), keeping
    /// its id and creation timestamp.
    ///
    /// # Errors
    ///
    /// [`VecturaError::DocumentNotFound`] if the id is not stored.
    #[instrument(skip_all, fields(%id))]
    pub async fn update_document(&self, id: Uuid, new_text: String) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if new_text.trim().is_empty() {
            return Err(VecturaError::InvalidInput(
                "Document text must contain at least one non-whitespace character".to_string(),
            ));
        }

        let existing = self
            .load_document(id)
            .await?
            .ok_or(VecturaError::DocumentNotFound(id))?;

        let embedding = self.embedder.embed(&new_text).await?;
        validate_dimension(self.dimension, embedding.len())?;
        let normalized = normalize(&embedding)?;

        let updated = existing.with_text(new_text, normalized);
        self.storage.update_document(&updated).await?;

        self.engine.remove_document(id).await;
        self.engine.index_document(&updated).await;
        Ok(())
    }

    /// Deletes documents by id. Unknown ids are ignored.
    #[instrument(skip_all, fields(count = ids.len()))]
    pub async fn delete_documents(&self, ids: &[Uuid]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.delete_locked(ids).await
    }

    /// Deletes a single document by id. Idempotent.
    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.delete_documents(&[id]).await
    }

    /// Removes every document.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let ids: Vec<Uuid> = self
            .storage
            .load_documents()
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        info!("Resetting database: deleting {} documents", ids.len());
        self.delete_locked(&ids).await
    }

    /// The number of stored documents.
    pub async fn document_count(&self) -> Result<usize> {
        self.storage.total_document_count().await
    }

    /// Every stored document.
    pub async fn all_documents(&self) -> Result<Vec<Document>> {
        self.storage.load_documents().await
    }

    /// Deletion body shared by `delete_documents` and `reset`; the caller
    /// holds the write lock.
    async fn delete_locked(&self, ids: &[Uuid]) -> Result<()> {
        for &id in ids {
            self.storage.delete_document(id).await?;
            self.engine.remove_document(id).await;
        }
        Ok(())
    }

    /// Loads one document, preferring the indexed by-id path over a full
    /// scan.
    async fn load_document(&self, id: Uuid) -> Result<Option<Document>> {
        if let Some(indexed) = self.storage.as_indexed() {
            let mut map = indexed.load_documents_by_ids(&[id]).await?;
            return Ok(map.remove(&id));
        }
        Ok(self
            .storage
            .load_documents()
            .await?
            .into_iter()
            .find(|d| d.id == id))
    }
}
