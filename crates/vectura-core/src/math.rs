//! Vector math: L2 normalization and batched cosine similarity.
//!
//! Documents are stored pre-normalized, so cosine similarity reduces to a
//! dot product and a whole corpus can be scored with one row-major
//! matrix–vector product.

use crate::error::{Result, VecturaError};

/// Dot product of two equal-length slices.
///
/// Callers are responsible for length agreement; mismatches are caught by
/// the dimension checks in the search paths before this is reached.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

/// L2-normalizes a vector.
///
/// # Errors
///
/// Returns [`VecturaError::InvalidInput`] if the norm is zero or non-finite
/// (a NaN or infinite component poisons the norm).
pub fn normalize(v: &[f32]) -> Result<Vec<f32>> {
    let norm_sq: f32 = v.iter().map(|&x| x * x).sum();
    let norm = norm_sq.sqrt();

    if norm == 0.0 || !norm.is_finite() {
        return Err(VecturaError::InvalidInput(format!(
            "Cannot normalize vector with zero norm (norm = {norm})"
        )));
    }

    Ok(v.iter().map(|&x| x / norm).collect())
}

/// Scores every row of a row-major `doc_count x dimension` matrix against a
/// normalized query vector.
///
/// Rows are pre-normalized document embeddings, so each output value is the
/// cosine similarity of that document to the query, in `[-1, 1]`.
///
/// # Errors
///
/// Returns [`VecturaError::DimensionMismatch`] if `query.len() != dimension`
/// and [`VecturaError::InvalidInput`] if the matrix size does not equal
/// `doc_count * dimension` (only reachable through corruption upstream).
pub fn batched_cosine(
    matrix: &[f32],
    query: &[f32],
    doc_count: usize,
    dimension: usize,
) -> Result<Vec<f32>> {
    if query.len() != dimension {
        return Err(VecturaError::DimensionMismatch {
            expected: dimension,
            got: query.len(),
        });
    }
    if matrix.len() != doc_count * dimension {
        return Err(VecturaError::InvalidInput(format!(
            "Embedding matrix size {} does not match {} documents of dimension {}",
            matrix.len(),
            doc_count,
            dimension
        )));
    }

    Ok(matrix
        .chunks_exact(dimension)
        .map(|row| dot(row, query))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = vec![3.0, 4.0];
        let n = normalize(&v).unwrap();
        let norm: f32 = n.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_already_unit() {
        let v = vec![1.0, 0.0, 0.0];
        let n = normalize(&v).unwrap();
        assert_eq!(n, v);
    }

    #[test]
    fn test_normalize_zero_vector_fails() {
        let result = normalize(&[0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(VecturaError::InvalidInput(_))));
    }

    #[test]
    fn test_normalize_nan_fails() {
        let result = normalize(&[1.0, f32::NAN]);
        assert!(matches!(result, Err(VecturaError::InvalidInput(_))));
    }

    #[test]
    fn test_normalize_infinite_fails() {
        let result = normalize(&[1.0, f32::INFINITY]);
        assert!(matches!(result, Err(VecturaError::InvalidInput(_))));
    }

    #[test]
    fn test_batched_cosine_scores() {
        // Three unit rows against a unit query.
        let matrix = vec![
            1.0, 0.0, //
            0.0, 1.0, //
            0.8, 0.6,
        ];
        let scores = batched_cosine(&matrix, &[1.0, 0.0], 3, 2).unwrap();
        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!(scores[1].abs() < 1e-6);
        assert!((scores[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_batched_cosine_query_dimension_mismatch() {
        let result = batched_cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0], 1, 2);
        assert!(matches!(
            result,
            Err(VecturaError::DimensionMismatch {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_batched_cosine_matrix_size_assertion() {
        // 3 floats cannot be 2 rows of dimension 2.
        let result = batched_cosine(&[1.0, 0.0, 0.5], &[1.0, 0.0], 2, 2);
        assert!(matches!(result, Err(VecturaError::InvalidInput(_))));
    }

    #[test]
    fn test_dot_orthogonal() {
        assert_eq!(dot(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }
}
