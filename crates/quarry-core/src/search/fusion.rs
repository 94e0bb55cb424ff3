// Weighted Reciprocal Rank Fusion (RRF) of a vector list and a lexical list

use super::types::{DocId, ScoredResult};
use std::collections::HashMap;
use tracing::instrument;

pub use crate::config::RRF_K;

/// Which ranked list a fused entry's payload should be taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Vector,
    Lexical,
}

/// One entry of a fused ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub id: DocId,
    /// Weighted RRF score
    pub score: f32,
    /// 1-indexed position in the vector list, if present there
    pub vector_rank: Option<usize>,
    /// 1-indexed position in the lexical list, if present there
    pub lexical_rank: Option<usize>,
}

impl FusedResult {
    /// Side to source the node payload from; vector wins when both contain the id.
    pub fn source(&self) -> ResultSource {
        if self.vector_rank.is_some() {
            ResultSource::Vector
        } else {
            ResultSource::Lexical
        }
    }
}

/// RRF contribution of a 1-indexed `rank`: `1 / (k + rank)`.
pub fn rrf(rank: usize, k: usize) -> f32 {
    1.0 / (k + rank) as f32
}

/// Candidates to request from each side before fusion.
///
/// `max(top_k, multiplier * top_k)`. Fusion only reorders what it is given,
/// so a document that ranks well combined but poorly on either side alone
/// needs a deep enough candidate pool to be seen at all.
pub fn prefetch_size(top_k: usize, multiplier: usize) -> usize {
    top_k.max(multiplier.saturating_mul(top_k))
}

/// Fuses two ranked lists by rank position.
///
/// Score formula for a document `d`:
///
/// ```text
/// score(d) = alpha * 1/(k + vector_rank(d)) + (1 - alpha) * 1/(k + lexical_rank(d))
/// ```
///
/// with `k` = [`RRF_K`]. A list that does not contain `d` contributes 0.
/// Raw scores in the input lists are ignored: only their order matters.
///
/// # Returns
/// At most `top_k` entries, non-increasing by score, ties broken by
/// ascending id.
#[instrument(skip_all, fields(vector = vector_results.len(), lexical = lexical_results.len(), alpha, top_k))]
pub fn combine_results(
    vector_results: &[ScoredResult],
    lexical_results: &[ScoredResult],
    alpha: f32,
    top_k: usize,
) -> Vec<FusedResult> {
    let mut fused: HashMap<&DocId, FusedResult> =
        HashMap::with_capacity(vector_results.len() + lexical_results.len());

    for (i, result) in vector_results.iter().enumerate() {
        let rank = i + 1;
        let entry = fused.entry(&result.id).or_insert_with(|| empty_entry(&result.id));
        // First occurrence is the best rank for that id
        if entry.vector_rank.is_none() {
            entry.vector_rank = Some(rank);
            entry.score += alpha * rrf(rank, RRF_K);
        }
    }

    for (i, result) in lexical_results.iter().enumerate() {
        let rank = i + 1;
        let entry = fused.entry(&result.id).or_insert_with(|| empty_entry(&result.id));
        if entry.lexical_rank.is_none() {
            entry.lexical_rank = Some(rank);
            entry.score += (1.0 - alpha) * rrf(rank, RRF_K);
        }
    }

    let mut combined: Vec<FusedResult> = fused.into_values().collect();
    combined.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    combined.truncate(top_k);
    combined
}

fn empty_entry(id: &DocId) -> FusedResult {
    FusedResult {
        id: id.clone(),
        score: 0.0,
        vector_rank: None,
        lexical_rank: None,
    }
}
