//! File-backed storage provider: one JSON document per file.
//!
//! Layout: `<root>/<database-name>/<id>.json`, each file holding a serialized
//! [`Document`]. The directory is created with owner-only permissions when
//! absent. An in-process cache (write-through, populated on first full load)
//! keeps repeat loads and counts off the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{IndexedStorage, VecturaStorage};
use crate::error::{Result, VecturaError};
use crate::search::types::Document;

/// Directory placed under the user documents folder when no storage root is
/// configured.
const DEFAULT_ROOT_DIR: &str = "VecturaKit";

/// Resolves the default storage root: the user documents directory, falling
/// back to the home directory, then the current directory.
pub fn default_storage_root() -> PathBuf {
    if let Some(user_dirs) = directories::UserDirs::new() {
        if let Some(docs) = user_dirs.document_dir() {
            return docs.join(DEFAULT_ROOT_DIR);
        }
        return user_dirs.home_dir().join(DEFAULT_ROOT_DIR);
    }
    PathBuf::from(DEFAULT_ROOT_DIR)
}

/// One-file-per-document storage with a write-through cache.
pub struct FileStorageProvider {
    directory: PathBuf,
    /// `None` until the first full load; afterwards mirrors the directory.
    cache: RwLock<Option<HashMap<Uuid, Document>>>,
}

impl FileStorageProvider {
    /// Creates a provider rooted at `<root>/<name>/`, using the default
    /// root when none is given. The directory itself is created lazily by
    /// [`create_storage_directory_if_needed`](VecturaStorage::create_storage_directory_if_needed).
    pub fn new(root: Option<PathBuf>, name: &str) -> Self {
        let root = root.unwrap_or_else(default_storage_root);
        Self {
            directory: root.join(name),
            cache: RwLock::new(None),
        }
    }

    /// The directory this provider reads and writes.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn document_path(&self, id: Uuid) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }

    /// Reads every `.json` file in the storage directory into a map.
    ///
    /// Files that fail to parse are skipped with a warning so one corrupt
    /// document cannot take the whole database down; I/O failures
    /// propagate as [`VecturaError::LoadFailed`].
    async fn load_from_disk(&self) -> Result<HashMap<Uuid, Document>> {
        let mut documents = HashMap::new();

        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            // A directory that was never created holds no documents.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(documents),
            Err(e) => {
                return Err(VecturaError::LoadFailed(format!(
                    "Failed to read storage directory {}: {e}",
                    self.directory.display()
                )))
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            VecturaError::LoadFailed(format!("Failed to enumerate storage directory: {e}"))
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                VecturaError::LoadFailed(format!("Failed to read {}: {e}", path.display()))
            })?;

            match serde_json::from_slice::<Document>(&bytes) {
                Ok(document) => {
                    documents.insert(document.id, document);
                }
                Err(e) => {
                    warn!("Skipping malformed document file {}: {e}", path.display());
                }
            }
        }

        debug!(
            "Loaded {} documents from {}",
            documents.len(),
            self.directory.display()
        );
        Ok(documents)
    }

    /// Returns the cached map, loading it from disk on first use.
    async fn ensure_cache(&self) -> Result<HashMap<Uuid, Document>> {
        {
            let cache = self.cache.read().await;
            if let Some(map) = cache.as_ref() {
                return Ok(map.clone());
            }
        }

        let loaded = self.load_from_disk().await?;
        let mut cache = self.cache.write().await;
        // Another loader may have won the race; keep whichever is present.
        if cache.is_none() {
            *cache = Some(loaded.clone());
            return Ok(loaded);
        }
        Ok(cache.as_ref().cloned().unwrap_or(loaded))
    }

    async fn write_document_file(&self, document: &Document) -> Result<()> {
        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| VecturaError::Storage(format!("Failed to serialize document: {e}")))?;

        let path = self.document_path(document.id);
        tokio::fs::write(&path, json).await.map_err(|e| {
            VecturaError::Storage(format!("Failed to write {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl VecturaStorage for FileStorageProvider {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        let map = self.ensure_cache().await?;
        Ok(map.into_values().collect())
    }

    async fn save_document(&self, document: &Document) -> Result<()> {
        self.create_storage_directory_if_needed().await?;
        self.write_document_file(document).await?;

        // Write-through: disk first, then cache.
        let mut cache = self.cache.write().await;
        if let Some(map) = cache.as_mut() {
            map.insert(document.id, document.clone());
        }
        Ok(())
    }

    async fn save_documents(&self, documents: &[Document]) -> Result<()> {
        self.create_storage_directory_if_needed().await?;
        for document in documents {
            self.write_document_file(document).await?;
        }

        let mut cache = self.cache.write().await;
        if let Some(map) = cache.as_mut() {
            for document in documents {
                map.insert(document.id, document.clone());
            }
        }
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        let path = self.document_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            // Deleting an absent document is fine.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(VecturaError::Storage(format!(
                    "Failed to delete {}: {e}",
                    path.display()
                )))
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(map) = cache.as_mut() {
            map.remove(&id);
        }
        Ok(())
    }

    async fn total_document_count(&self) -> Result<usize> {
        {
            let cache = self.cache.read().await;
            if let Some(map) = cache.as_ref() {
                return Ok(map.len());
            }
        }

        // Cold cache: count directory entries without deserializing.
        let mut count = 0;
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(VecturaError::Storage(format!(
                    "Failed to read storage directory: {e}"
                )))
            }
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VecturaError::Storage(format!("Failed to enumerate directory: {e}")))?
        {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn create_storage_directory_if_needed(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.directory).await.unwrap_or(false) {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| {
                VecturaError::Storage(format!(
                    "Failed to create storage directory {}: {e}",
                    self.directory.display()
                ))
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            tokio::fs::set_permissions(&self.directory, perms)
                .await
                .map_err(|e| {
                    VecturaError::Storage(format!(
                        "Failed to set permissions on storage directory: {e}"
                    ))
                })?;
        }

        Ok(())
    }

    fn as_indexed(&self) -> Option<&dyn IndexedStorage> {
        Some(self)
    }
}

#[async_trait]
impl IndexedStorage for FileStorageProvider {
    async fn load_documents_page(&self, offset: usize, limit: usize) -> Result<Vec<Document>> {
        let map = self.ensure_cache().await?;
        let mut all: Vec<Document> = map.into_values().collect();
        all.sort_by_key(|d| d.id);
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn load_documents_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Document>> {
        {
            let cache = self.cache.read().await;
            if let Some(map) = cache.as_ref() {
                return Ok(ids
                    .iter()
                    .filter_map(|id| map.get(id).map(|d| (*id, d.clone())))
                    .collect());
            }
        }

        // Cold cache: read exactly the requested files.
        let mut found = HashMap::with_capacity(ids.len());
        for &id in ids {
            let path = self.document_path(id);
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(VecturaError::LoadFailed(format!(
                        "Failed to read {}: {e}",
                        path.display()
                    )))
                }
            };
            match serde_json::from_slice::<Document>(&bytes) {
                Ok(document) => {
                    found.insert(id, document);
                }
                Err(e) => {
                    warn!("Skipping malformed document file {}: {e}", path.display());
                }
            }
        }
        Ok(found)
    }

    async fn search_vector_candidates(
        &self,
        _query_embedding: &[f32],
        _top_k: usize,
        _prefilter_size: usize,
    ) -> Result<Option<Vec<Uuid>>> {
        // No vector index lives next to the files; the engine falls back to
        // exact search.
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dir: &Path) -> FileStorageProvider {
        // Root is the temp dir; database name is "test".
        FileStorageProvider::new(Some(dir.to_path_buf()), "test")
    }

    fn doc(text: &str) -> Document {
        Document::new(text.to_string(), vec![0.6, 0.8])
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());

        let d = doc("persisted");
        store.save_document(&d).await.unwrap();

        // A fresh provider over the same directory sees the document.
        let reopened = provider(tmp.path());
        let loaded = reopened.load_documents().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, d.id);
        assert_eq!(loaded[0].text, "persisted");
        assert_eq!(loaded[0].embedding, d.embedding);
        assert_eq!(loaded[0].created_at, d.created_at);
    }

    #[tokio::test]
    async fn test_file_named_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());

        let d = doc("named");
        store.save_document(&d).await.unwrap();

        let expected = tmp.path().join("test").join(format!("{}.json", d.id));
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_empty_directory_loads_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());
        assert!(store.load_documents().await.unwrap().is_empty());
        assert_eq!(store.total_document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_cache_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());

        let d = doc("short-lived");
        store.save_document(&d).await.unwrap();
        store.load_documents().await.unwrap(); // warm the cache

        store.delete_document(d.id).await.unwrap();
        assert!(store.load_documents().await.unwrap().is_empty());
        assert!(!tmp.path().join("test").join(format!("{}.json", d.id)).exists());

        // Idempotent.
        store.delete_document(d.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_count_without_cache_scans_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());
        store.save_documents(&[doc("a"), doc("b")]).await.unwrap();

        let cold = provider(tmp.path());
        assert_eq!(cold.total_document_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());
        store.save_document(&doc("good")).await.unwrap();

        let bad = tmp.path().join("test").join("not-a-doc.json");
        tokio::fs::write(&bad, b"{ nope").await.unwrap();

        let fresh = provider(tmp.path());
        let loaded = fresh.load_documents().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "good");
    }

    #[tokio::test]
    async fn test_load_by_ids_cold_reads_exact_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());
        let a = doc("a");
        let b = doc("b");
        store.save_documents(&[a.clone(), b.clone()]).await.unwrap();

        let cold = provider(tmp.path());
        let indexed = cold.as_indexed().unwrap();
        let map = indexed
            .load_documents_by_ids(&[a.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&a.id].text, "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());
        store.create_storage_directory_if_needed().await.unwrap();
        // Idempotent.
        store.create_storage_directory_if_needed().await.unwrap();

        let meta = std::fs::metadata(tmp.path().join("test")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_update_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let store = provider(tmp.path());

        let d = doc("before");
        store.save_document(&d).await.unwrap();
        let updated = d.with_text("after".to_string(), vec![0.0, 1.0]);
        store.update_document(&updated).await.unwrap();

        let loaded = store.load_documents().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "after");
        assert_eq!(loaded[0].created_at, d.created_at);
    }
}
