//! Database configuration: identity, dimension, memory strategy, and search
//! defaults.
//!
//! A [`VecturaConfig`] is validated once, when the database is opened; every
//! constraint violation surfaces as [`VecturaError::InvalidInput`] before
//! any state is touched.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecturaError};

/// How the vector search engine sources its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryStrategy {
    /// Always load every document and score it exactly.
    FullMemory,
    /// Always delegate candidate selection to indexed storage.
    Indexed {
        /// Ratio of prefilter size to requested result count.
        candidate_multiplier: usize,
        /// Candidate ids loaded per storage call.
        batch_size: usize,
        /// Maximum storage-load tasks in flight at once.
        max_concurrent_batches: usize,
    },
    /// Use the indexed path once the corpus reaches `threshold` documents.
    Automatic {
        /// Document count at which the indexed path takes over.
        threshold: usize,
        /// Ratio of prefilter size to requested result count.
        candidate_multiplier: usize,
        /// Candidate ids loaded per storage call.
        batch_size: usize,
        /// Maximum storage-load tasks in flight at once.
        max_concurrent_batches: usize,
    },
}

impl MemoryStrategy {
    /// Validates the strategy's numeric constraints.
    pub fn validate(&self) -> Result<()> {
        let (multiplier, batch, concurrency) = match *self {
            Self::FullMemory => return Ok(()),
            Self::Indexed {
                candidate_multiplier,
                batch_size,
                max_concurrent_batches,
            }
            | Self::Automatic {
                candidate_multiplier,
                batch_size,
                max_concurrent_batches,
                ..
            } => (candidate_multiplier, batch_size, max_concurrent_batches),
        };

        if multiplier == 0 {
            return Err(VecturaError::InvalidInput(
                "candidate_multiplier must be at least 1".to_string(),
            ));
        }
        if batch == 0 {
            return Err(VecturaError::InvalidInput(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if concurrency == 0 {
            return Err(VecturaError::InvalidInput(
                "max_concurrent_batches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStrategy {
    /// The automatic strategy: brute force below 10k documents, indexed
    /// candidate prefetch above.
    fn default() -> Self {
        Self::Automatic {
            threshold: 10_000,
            candidate_multiplier: 4,
            batch_size: 100,
            max_concurrent_batches: 4,
        }
    }
}

/// Default search behavior and hybrid-scoring tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result count used when a search call omits one.
    pub default_num_results: usize,
    /// Threshold applied when a search call omits one; `None` disables
    /// filtering.
    pub min_threshold: Option<f32>,
    /// Weight of the vector score in hybrid fusion, clamped to `[0, 1]`.
    pub hybrid_weight: f32,
    /// Divisor applied to raw BM25 scores before fusion.
    pub bm25_normalization_factor: f32,
    /// BM25 term-frequency saturation parameter. Stored for embedders that
    /// tune their lexical engine; opaque to the core.
    pub k1: f32,
    /// BM25 length-normalization parameter. Opaque to the core.
    pub b: f32,
}

impl SearchConfig {
    fn validate(&self) -> Result<()> {
        if self.default_num_results == 0 {
            return Err(VecturaError::InvalidInput(
                "default_num_results must be at least 1".to_string(),
            ));
        }
        if let Some(t) = self.min_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(VecturaError::InvalidInput(format!(
                    "min_threshold must lie in [0, 1], got {t}"
                )));
            }
        }
        if self.bm25_normalization_factor <= 0.0 {
            return Err(VecturaError::InvalidInput(
                "bm25_normalization_factor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_num_results: 10,
            min_threshold: None,
            hybrid_weight: 0.5,
            bm25_normalization_factor: 10.0,
            k1: 1.2,
            b: 0.75,
        }
    }
}

/// Configuration for one database instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VecturaConfig {
    /// Database name; becomes the storage subdirectory.
    pub name: String,
    /// Storage root. When `None` the user documents directory is used
    /// (`VecturaKit/<name>/`).
    pub directory: Option<PathBuf>,
    /// Overrides the embedder's reported dimension when set.
    pub dimension: Option<usize>,
    /// Candidate-sourcing strategy for the vector engine.
    pub memory_strategy: MemoryStrategy,
    /// Search defaults and hybrid tuning.
    pub search: SearchConfig,
}

impl VecturaConfig {
    /// Creates a configuration with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: None,
            dimension: None,
            memory_strategy: MemoryStrategy::default(),
            search: SearchConfig::default(),
        }
    }

    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VecturaError::InvalidInput`] naming the first violated
    /// constraint.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VecturaError::InvalidInput(
                "database name must not be empty".to_string(),
            ));
        }
        if self.dimension == Some(0) {
            return Err(VecturaError::InvalidInput(
                "dimension must be positive".to_string(),
            ));
        }
        self.memory_strategy.validate()?;
        self.search.validate()
    }

    /// Sets the storage root.
    #[must_use]
    pub fn with_directory(mut self, directory: PathBuf) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Sets an explicit dimension, overriding the embedder's.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Sets the memory strategy.
    #[must_use]
    pub fn with_memory_strategy(mut self, strategy: MemoryStrategy) -> Self {
        self.memory_strategy = strategy;
        self
    }

    /// Sets the search defaults.
    #[must_use]
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }
}
