//! BM25 lexical search engine.
//!
//! Wraps the [`bm25`](https://crates.io/crates/bm25) crate. Scores are
//! non-negative and unbounded above; the hybrid engine normalizes them
//! before fusion.
//!
//! The bm25 crate has no in-place delete, so removal is a tombstone: removed
//! ids are filtered out of results, and once tombstones outnumber half the
//! live corpus the index is rebuilt from the retained texts.

use std::collections::{HashMap, HashSet};

use bm25::{Document, Language, SearchEngineBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Rebuild as soon as tombstones reach this share of live documents.
const REBUILD_TOMBSTONE_RATIO: f32 = 0.5;

/// BM25 keyword search over document text.
///
/// Mirrors the vector engine's maintenance surface: `index_document`,
/// `remove_document`, `search`. Not internally synchronized — the hybrid
/// engine wraps it in a lock.
pub struct TextSearchEngine {
    search_engine: bm25::SearchEngine<Uuid>,
    /// Live text per id, the rebuild source.
    texts: HashMap<Uuid, String>,
    /// Removed ids still present in the bm25 index.
    tombstones: HashSet<Uuid>,
}

impl TextSearchEngine {
    /// Creates an empty engine with English tokenization.
    pub fn new() -> Self {
        let empty: Vec<Document<Uuid>> = Vec::new();
        Self {
            search_engine: SearchEngineBuilder::<Uuid>::with_documents(Language::English, empty)
                .build(),
            texts: HashMap::new(),
            tombstones: HashSet::new(),
        }
    }

    /// Indexes a document's text (upsert by id).
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub fn index_document(&mut self, id: Uuid, text: String) {
        self.tombstones.remove(&id);
        self.texts.insert(id, text.clone());
        self.search_engine.upsert(Document { id, contents: text });
    }

    /// Removes a document from the index.
    ///
    /// Idempotent. The underlying entry persists as a tombstone until the
    /// next rebuild.
    pub fn remove_document(&mut self, id: Uuid) {
        if self.texts.remove(&id).is_some() {
            self.tombstones.insert(id);
        }
        self.maybe_rebuild();
    }

    /// Searches for documents matching the query.
    ///
    /// Returns up to `limit` `(id, score)` pairs, best first, scores
    /// non-negative. Empty queries and empty indexes return nothing.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(Uuid, f32)> {
        // Over-fetch to compensate for tombstoned entries still indexed.
        let fetch = limit.saturating_add(self.tombstones.len());
        self.search_engine
            .search(query, fetch)
            .into_iter()
            .map(|result| (result.document.id, result.score))
            .filter(|(id, _)| !self.tombstones.contains(id))
            .take(limit)
            .collect()
    }

    /// Rebuilds the index from a set of documents, dropping all tombstones.
    ///
    /// Used when warm-loading a database from storage.
    pub fn rebuild_from<I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = (Uuid, String)>,
    {
        self.texts = documents.into_iter().collect();
        self.tombstones.clear();

        let docs: Vec<Document<Uuid>> = self
            .texts
            .iter()
            .map(|(&id, text)| Document {
                id,
                contents: text.clone(),
            })
            .collect();
        self.search_engine =
            SearchEngineBuilder::<Uuid>::with_documents(Language::English, docs).build();
    }

    /// The number of live (non-tombstoned) documents.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Whether no live documents are indexed.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    fn maybe_rebuild(&mut self) {
        let tombstones = self.tombstones.len();
        if tombstones == 0 {
            return;
        }
        if (tombstones as f32) >= (self.texts.len() as f32) * REBUILD_TOMBSTONE_RATIO {
            debug!(
                "Rebuilding lexical index: {} live, {} tombstoned",
                self.texts.len(),
                tombstones
            );
            let retained: Vec<(Uuid, String)> = self
                .texts
                .iter()
                .map(|(&id, text)| (id, text.clone()))
                .collect();
            self.rebuild_from(retained);
        }
    }
}

impl Default for TextSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}
