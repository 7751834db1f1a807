//! Cosine-similarity ranking over stored embeddings.

use serde::Serialize;
use std::cmp::Ordering;

/// One ranked chunk from a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Position of the chunk in the document's ordered sequence
    pub index: usize,

    /// Chunk text
    pub text: String,

    /// Cosine similarity in [-1, 1]. Not a probability.
    pub score: f32,
}

/// Calculate cosine similarity between two vectors.
///
/// Mismatched lengths and zero-norm vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank embeddings against a query vector, highest similarity first.
///
/// Returns at most `min(top_k, embeddings.len())` `(index, score)` pairs.
/// Ties break on original chunk order, so results are deterministic.
pub fn rank(query: &[f32], embeddings: &[Vec<f32>], top_k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = embeddings
        .iter()
        .enumerate()
        .map(|(i, embedding)| (i, cosine_similarity(query, embedding)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![2.0, 4.0, 6.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_rank_orders_by_score() {
        let query = vec![1.0, 0.0];
        let embeddings = vec![
            vec![0.0, 1.0],  // orthogonal
            vec![1.0, 0.0],  // identical
            vec![1.0, 1.0],  // 45 degrees
        ];

        let ranked = rank(&query, &embeddings, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 2);
        assert_eq!(ranked[2].0, 0);
        assert!(ranked[0].1 >= ranked[1].1 && ranked[1].1 >= ranked[2].1);
    }

    #[test]
    fn test_rank_clamps_top_k() {
        // top_k larger than the corpus returns everything, not an error
        let query = vec![1.0, 0.0];
        let embeddings = vec![vec![1.0, 0.0]; 5];

        let ranked = rank(&query, &embeddings, 10);
        assert_eq!(ranked.len(), 5);
    }

    #[test]
    fn test_rank_ties_break_on_chunk_order() {
        let query = vec![1.0, 0.0];
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
        ];

        // All three score 1.0; order must follow the original indexes
        let ranked = rank(&query, &embeddings, 3);
        let indexes: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_rank_empty_corpus() {
        let ranked = rank(&[1.0, 0.0], &[], 5);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_rank_zero_top_k() {
        let ranked = rank(&[1.0], &[vec![1.0]], 0);
        assert!(ranked.is_empty());
    }
}
