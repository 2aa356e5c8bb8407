//! In-memory storage provider for tests and transient databases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{IndexedStorage, VecturaStorage};
use crate::error::Result;
use crate::search::types::Document;

/// HashMap-backed provider. Nothing is persisted.
///
/// Implements the indexed capability — paging and keyed loads are natural
/// over a map — but carries no vector index, so
/// [`search_vector_candidates`](IndexedStorage::search_vector_candidates)
/// always reports `None` and the engine falls back to exact search.
#[derive(Default)]
pub struct InMemoryStorageProvider {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl InMemoryStorageProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VecturaStorage for InMemoryStorageProvider {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        let docs = self.documents.read().await;
        Ok(docs.values().cloned().collect())
    }

    async fn save_document(&self, document: &Document) -> Result<()> {
        let mut docs = self.documents.write().await;
        docs.insert(document.id, document.clone());
        Ok(())
    }

    async fn save_documents(&self, documents: &[Document]) -> Result<()> {
        let mut docs = self.documents.write().await;
        for document in documents {
            docs.insert(document.id, document.clone());
        }
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        let mut docs = self.documents.write().await;
        docs.remove(&id);
        Ok(())
    }

    async fn total_document_count(&self) -> Result<usize> {
        let docs = self.documents.read().await;
        Ok(docs.len())
    }

    async fn create_storage_directory_if_needed(&self) -> Result<()> {
        Ok(())
    }

    fn as_indexed(&self) -> Option<&dyn IndexedStorage> {
        Some(self)
    }
}

#[async_trait]
impl IndexedStorage for InMemoryStorageProvider {
    async fn load_documents_page(&self, offset: usize, limit: usize) -> Result<Vec<Document>> {
        let docs = self.documents.read().await;
        // Sort by id for a stable page order across calls.
        let mut all: Vec<&Document> = docs.values().collect();
        all.sort_by_key(|d| d.id);
        Ok(all.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn load_documents_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Document>> {
        let docs = self.documents.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| docs.get(id).map(|d| (*id, d.clone())))
            .collect())
    }

    async fn search_vector_candidates(
        &self,
        _query_embedding: &[f32],
        _top_k: usize,
        _prefilter_size: usize,
    ) -> Result<Option<Vec<Uuid>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new(text.to_string(), vec![1.0, 0.0])
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryStorageProvider::new();
        let d = doc("hello");
        store.save_document(&d).await.unwrap();

        let loaded = store.load_documents().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, d.id);
        assert_eq!(store.total_document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let store = InMemoryStorageProvider::new();
        let d = doc("first");
        store.save_document(&d).await.unwrap();

        let replacement = d.with_text("second".to_string(), vec![0.0, 1.0]);
        store.save_document(&replacement).await.unwrap();

        let loaded = store.load_documents().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "second");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStorageProvider::new();
        let d = doc("to delete");
        store.save_document(&d).await.unwrap();

        store.delete_document(d.id).await.unwrap();
        store.delete_document(d.id).await.unwrap();
        assert_eq!(store.total_document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_save() {
        let store = InMemoryStorageProvider::new();
        let docs = vec![doc("a"), doc("b"), doc("c")];
        store.save_documents(&docs).await.unwrap();
        assert_eq!(store.total_document_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_load_by_ids_skips_missing() {
        let store = InMemoryStorageProvider::new();
        let a = doc("a");
        let b = doc("b");
        store.save_documents(&[a.clone(), b.clone()]).await.unwrap();

        let indexed = store.as_indexed().expect("memory store is indexed");
        let map = indexed
            .load_documents_by_ids(&[a.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&a.id));
    }

    #[tokio::test]
    async fn test_paged_load_is_stable() {
        let store = InMemoryStorageProvider::new();
        for i in 0..5 {
            store.save_document(&doc(&format!("doc {i}"))).await.unwrap();
        }

        let indexed = store.as_indexed().unwrap();
        let first = indexed.load_documents_page(0, 2).await.unwrap();
        let second = indexed.load_documents_page(2, 2).await.unwrap();
        let third = indexed.load_documents_page(4, 2).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(third.len(), 1);

        let mut ids: Vec<Uuid> = first
            .iter()
            .chain(second.iter())
            .chain(third.iter())
            .map(|d| d.id)
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn test_no_candidate_index() {
        let store = InMemoryStorageProvider::new();
        let indexed = store.as_indexed().unwrap();
        let candidates = indexed
            .search_vector_candidates(&[1.0, 0.0], 1, 4)
            .await
            .unwrap();
        assert!(candidates.is_none());
    }
}
