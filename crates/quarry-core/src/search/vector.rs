// Brute-force vector scoring over a candidate set

use super::types::{rank_and_truncate, DocId, ScoredResult};
use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Similarity measure used to rank embeddings.
///
/// Every variant is converted so that larger means more similar, which is
/// what the fusion step expects of a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity in [-1, 1]
    #[default]
    Cosine,
    /// Raw inner product (equals cosine for L2-normalized embeddings)
    DotProduct,
    /// Euclidean distance mapped to `1 / (1 + d)`, in (0, 1]
    Euclidean,
}

impl DistanceMetric {
    /// Similarity of `a` and `b` over their shared prefix.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::DotProduct => dot_product(a, b),
            DistanceMetric::Euclidean => 1.0 / (1.0 + euclidean_distance(a, b)),
        }
    }
}

/// Cosine similarity over `min(a.len(), b.len())` leading dimensions.
///
/// Returns 0.0 when either prefix has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let dot = dot_product(a, b);
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Exhaustive vector scorer.
///
/// Production deployments delegate nearest-neighbour search to the backend's
/// ANN index; this scorer is the in-memory reference used for the
/// [`InMemoryCorpusStore`](crate::storage::InMemoryCorpusStore) and in tests.
///
/// Embeddings of unequal length are compared over their shared prefix
/// instead of failing, since dimensionality is normalized upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorScorer {
    metric: DistanceMetric,
}

impl VectorScorer {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Ranks `candidates` by similarity to `query_embedding`.
    ///
    /// # Returns
    /// Up to `top_k` results, descending by similarity, ties broken by ascending id.
    ///
    /// # Errors
    ///
    /// Returns `RetrievalError::Precondition` if `query_embedding` is empty.
    #[instrument(skip_all, fields(candidates = candidates.len(), top_k))]
    pub fn score(
        &self,
        query_embedding: &[f32],
        candidates: &[(DocId, Vec<f32>)],
        top_k: usize,
    ) -> Result<Vec<ScoredResult>> {
        if query_embedding.is_empty() {
            return Err(RetrievalError::precondition(
                "vector scoring requires a non-empty query embedding",
            ));
        }

        let mut clamped = 0usize;
        let mut results: Vec<ScoredResult> = candidates
            .iter()
            .map(|(id, embedding)| {
                if embedding.len() != query_embedding.len() {
                    clamped += 1;
                }
                ScoredResult {
                    id: id.clone(),
                    score: self.metric.similarity(query_embedding, embedding),
                }
            })
            .collect();

        if clamped > 0 {
            warn!(
                clamped,
                query_dim = query_embedding.len(),
                "Scored embeddings of unequal length over their shared prefix"
            );
        }

        rank_and_truncate(&mut results, top_k);
        Ok(results)
    }
}
