//! Deterministic term-hashing embedder.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use super::TextEmbedder;
use crate::error::{Result, VecturaError};

/// Embeds text by feature-hashing its terms into a fixed-dimension vector.
///
/// Each lowercased alphanumeric term is hashed to a bucket and a sign, and
/// the resulting counts form the embedding. Texts sharing terms get
/// correlated vectors, which is all the test suite and the CLI need; real
/// deployments plug a model-backed [`TextEmbedder`] in instead.
///
/// The output is not normalized — the database normalizes at write time.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Creates an embedder producing vectors of the given dimension.
    ///
    /// # Errors
    ///
    /// Returns [`VecturaError::InvalidInput`] if `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VecturaError::InvalidInput(
                "embedder dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let term = term.to_lowercase();
            let mut hasher = DefaultHasher::new();
            term.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            // One hash bit decides the sign so unrelated terms cancel
            // rather than accumulate.
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        // Whitespace-only text hashes to the zero vector, which cannot be
        // normalized; give it a stable direction instead.
        if vector.iter().all(|&x| x == 0.0) {
            vector[0] = 1.0;
        }

        vector
    }
}

#[async_trait]
impl TextEmbedder for HashingEmbedder {
    async fn dimension(&self) -> Result<usize> {
        Ok(self.dimension)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}
