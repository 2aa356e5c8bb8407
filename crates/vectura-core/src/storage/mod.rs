//! Storage contracts.
//!
//! Providers implement [`VecturaStorage`], the basic capability set the
//! orchestrator and the brute-force search path consume. Providers that can
//! do better than load-everything additionally expose [`IndexedStorage`]
//! through [`VecturaStorage::as_indexed`]; the search engine queries that
//! capability at runtime and only takes the candidate-prefetch path when it
//! is present.

mod file_store;
mod memory_store;

pub use file_store::{default_storage_root, FileStorageProvider};
pub use memory_store::InMemoryStorageProvider;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::search::types::Document;

/// Basic storage capability: every provider implements this.
#[async_trait]
pub trait VecturaStorage: Send + Sync {
    /// Loads every stored document.
    async fn load_documents(&self) -> Result<Vec<Document>>;

    /// Persists a document, replacing any existing document with the same
    /// id.
    async fn save_document(&self, document: &Document) -> Result<()>;

    /// Persists a batch of documents (upsert by id).
    ///
    /// Equivalent to per-document saves in any order; providers may
    /// optimize. The default implementation loops.
    async fn save_documents(&self, documents: &[Document]) -> Result<()> {
        for document in documents {
            self.save_document(document).await?;
        }
        Ok(())
    }

    /// Deletes a document by id. Succeeds whether or not the id existed.
    async fn delete_document(&self, id: Uuid) -> Result<()>;

    /// Replaces a stored document, preserving its id (upsert).
    async fn update_document(&self, document: &Document) -> Result<()> {
        self.save_document(document).await
    }

    /// The number of stored documents. Cheap; providers may serve this from
    /// a cache.
    async fn total_document_count(&self) -> Result<usize>;

    /// Creates the provider's backing directory if it does not exist.
    /// Idempotent; a no-op for providers without one.
    async fn create_storage_directory_if_needed(&self) -> Result<()>;

    /// The provider's indexed capability, when it has one.
    fn as_indexed(&self) -> Option<&dyn IndexedStorage> {
        None
    }
}

/// Indexed storage capability: paged and keyed access plus an optional
/// candidate shortlist.
#[async_trait]
pub trait IndexedStorage: Send + Sync {
    /// Loads a page of documents. Order is provider-defined but stable
    /// across calls while the corpus is unchanged.
    async fn load_documents_page(&self, offset: usize, limit: usize) -> Result<Vec<Document>>;

    /// Loads documents by id. Ids absent from the returned map were not
    /// found; that is not an error.
    async fn load_documents_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Document>>;

    /// Returns an approximate-similarity shortlist for the query, best
    /// first, at most `prefilter_size` ids.
    ///
    /// `Ok(None)` means the provider has no vector index and the engine
    /// must fall back to exact search. `Ok(Some(vec![]))` means the index
    /// exists and found nothing.
    async fn search_vector_candidates(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        prefilter_size: usize,
    ) -> Result<Option<Vec<Uuid>>>;
}

// Blanket implementation so an Arc-shared provider can be handed to the
// database and the engines at the same time.
#[async_trait]
impl<T: VecturaStorage + ?Sized> VecturaStorage for std::sync::Arc<T> {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        (**self).load_documents().await
    }

    async fn save_document(&self, document: &Document) -> Result<()> {
        (**self).save_document(document).await
    }

    async fn save_documents(&self, documents: &[Document]) -> Result<()> {
        (**self).save_documents(documents).await
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        (**self).delete_document(id).await
    }

    async fn update_document(&self, document: &Document) -> Result<()> {
        (**self).update_document(document).await
    }

    async fn total_document_count(&self) -> Result<usize> {
        (**self).total_document_count().await
    }

    async fn create_storage_directory_if_needed(&self) -> Result<()> {
        (**self).create_storage_directory_if_needed().await
    }

    fn as_indexed(&self) -> Option<&dyn IndexedStorage> {
        (**self).as_indexed()
    }
}
