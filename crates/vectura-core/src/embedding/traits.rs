//! The embedder seam.

use async_trait::async_trait;

use crate::error::Result;

/// Produces dense embeddings for text.
///
/// Implementations must report the same dimension for the lifetime of a
/// database instance; every embedding they return must have that length.
/// They are assumed safe for concurrent calls — an implementation that is
/// not must serialize internally.
///
/// Model-host endpoint overrides (environment variables and the like) are
/// the implementation's business; the core never reads the environment.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// The dimension of embeddings this embedder produces.
    ///
    /// May perform I/O (e.g. loading a model) on first call.
    async fn dimension(&self) -> Result<usize>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts, one output vector per input.
    ///
    /// The default implementation loops over [`embed`](Self::embed);
    /// model-backed implementations should batch for throughput.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}
