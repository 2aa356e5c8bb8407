//! Error types for vectura-core.
//!
//! A single [`VecturaError`] enum covers every failure the library reports.
//! Validation errors (`InvalidInput`, `DimensionMismatch`) are raised before
//! any state mutation; storage errors are propagated and may leave a batch
//! partially applied.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by database, search, and storage operations.
#[derive(Debug, Clone, Error)]
pub enum VecturaError {
    /// Malformed caller input: empty batches, whitespace-only text,
    /// mismatched id/text counts, zero-norm vectors, bad options.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A vector's length differs from the database dimension.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// The database dimension.
        expected: usize,
        /// The length actually supplied.
        got: usize,
    },

    /// `update_document` was called with an id that is not stored.
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Storage I/O failed while loading documents; also raised by the
    /// batched candidate loader when every batch fails.
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// Opaque wrapper for storage-provider failures.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The embedder reported a failure.
    #[error("Embedding error: {0}")]
    Embedding(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VecturaError>;

/// Validates that a vector has the expected dimension.
///
/// Returns `Err(VecturaError::DimensionMismatch)` otherwise.
pub fn validate_dimension(expected: usize, got: usize) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(VecturaError::DimensionMismatch { expected, got })
    }
}
