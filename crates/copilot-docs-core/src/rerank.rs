//! Cross-encoder re-ranking.
//!
//! The second ranking stage scores each `(query, document)` pair jointly
//! and keeps the best `n` candidates. Re-ranking only reorders and
//! truncates the nearest-neighbor candidates; it never adds new ones.
//!
//! # Tie-break
//!
//! Candidates with equal scores keep their nearest-neighbor order (the
//! sort is stable). A `NaN` score ranks below every real score.

use std::cmp::Ordering;

use anyhow::{bail, Result};

/// Default number of candidates kept after re-ranking.
pub const DEFAULT_NUM_RANKED: usize = 10;

/// A relevance model over `(query, document)` pairs.
pub trait CrossEncoder: Send + Sync {
    /// Model identifier (e.g. `"bge-reranker-base"`).
    fn model_name(&self) -> &str;
    /// One relevance score per document, in input order. Higher is more
    /// relevant; scores are only comparable within one call.
    fn predict(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

/// Score `documents` against `query`, validating the response shape.
pub fn score_pairs(encoder: &dyn CrossEncoder, query: &str, documents: &[String]) -> Result<Vec<f32>> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }
    let scores = encoder.predict(query, documents)?;
    if scores.len() != documents.len() {
        bail!(
            "Cross-encoder '{}' returned {} scores for {} documents",
            encoder.model_name(),
            scores.len(),
            documents.len()
        );
    }
    Ok(scores)
}

/// Indices of the `n` highest scores, best first.
///
/// ```rust
/// use copilot_docs_core::rerank::top_ranked;
///
/// assert_eq!(top_ranked(&[0.1, 0.9, 0.5, 0.9], 3), vec![1, 3, 2]);
/// ```
pub fn top_ranked(scores: &[f32], n: usize) -> Vec<usize> {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        key(scores[b])
            .partial_cmp(&key(scores[a]))
            .unwrap_or(Ordering::Equal)
    });
    order.truncate(n);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEncoder;

    impl CrossEncoder for LengthEncoder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn predict(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
            Ok(documents.iter().map(|d| d.len() as f32).collect())
        }
    }

    struct ShortEncoder;

    impl CrossEncoder for ShortEncoder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn predict(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    #[test]
    fn test_top_ranked_descending() {
        assert_eq!(top_ranked(&[0.2, 0.8, 0.5], 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_top_ranked_truncates() {
        assert_eq!(top_ranked(&[0.2, 0.8, 0.5, 0.9], 2), vec![3, 1]);
        assert_eq!(top_ranked(&[0.2, 0.8], 10), vec![1, 0]);
        assert!(top_ranked(&[], 10).is_empty());
        assert!(top_ranked(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_top_ranked_ties_keep_store_order() {
        assert_eq!(top_ranked(&[0.5, 0.5, 0.7, 0.5], 4), vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_top_ranked_nan_last() {
        assert_eq!(top_ranked(&[f32::NAN, -3.0, 1.0], 3), vec![2, 1, 0]);
    }

    #[test]
    fn test_score_pairs() {
        let docs = vec!["a".to_string(), "abc".to_string()];
        assert_eq!(score_pairs(&LengthEncoder, "q", &docs).unwrap(), vec![1.0, 3.0]);
        assert!(score_pairs(&LengthEncoder, "q", &[]).unwrap().is_empty());
        assert!(score_pairs(&ShortEncoder, "q", &docs).is_err());
    }
}
