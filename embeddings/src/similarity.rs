//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero vector has no direction, so similarity against one is defined
/// as 0.0 rather than an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// A scored candidate from a ranking pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// ID of the matched item.
    pub id: String,

    /// Cosine similarity against the query vector.
    pub score: f32,
}

impl ScoredCandidate {
    /// Create a new scored candidate.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Score candidates against a query vector, keep those at or above
/// `threshold`, and return the best `limit` in descending score order.
///
/// Ties are broken by ascending ID so rankings are reproducible.
pub fn rank_candidates(
    query: &Embedding,
    candidates: &[(String, Embedding)],
    threshold: f32,
    limit: usize,
) -> Result<Vec<ScoredCandidate>> {
    let mut scores: Vec<(OrderedFloat<f32>, &str)> = Vec::with_capacity(candidates.len());

    for (id, embedding) in candidates {
        let score = cosine_similarity(query, embedding)?;
        if score >= threshold {
            scores.push((OrderedFloat(score), id.as_str()));
        }
    }

    // Sort by score descending, ID ascending on ties
    scores.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    let results: Vec<ScoredCandidate> = scores
        .into_iter()
        .take(limit)
        .map(|(score, id)| ScoredCandidate::new(id, score.0))
        .collect();

    Ok(results)
}
