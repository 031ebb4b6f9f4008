//! Reciprocal Rank Fusion for combining ranked hit lists
//!
//! Used when the engine cannot fuse sub-searches itself.

use crate::engine::{RawHit, RrfParams};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid rank constant: must be finite and non-negative")]
    InvalidRankConstant,

    #[error("Invalid rank window: must be greater than zero")]
    InvalidWindow,
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rank_constant: f64,

    /// Only the top `rank_window_size` entries of each ranking contribute
    pub rank_window_size: usize,
}

impl FusionConfig {
    pub fn new(rank_constant: f64, rank_window_size: usize) -> Result<Self, FusionError> {
        if !rank_constant.is_finite() || rank_constant < 0.0 {
            return Err(FusionError::InvalidRankConstant);
        }
        if rank_window_size == 0 {
            return Err(FusionError::InvalidWindow);
        }

        Ok(Self {
            rank_constant,
            rank_window_size,
        })
    }
}

impl TryFrom<RrfParams> for FusionConfig {
    type Error = FusionError;

    fn try_from(params: RrfParams) -> Result<Self, Self::Error> {
        Self::new(params.rank_constant as f64, params.rank_window_size)
    }
}

/// Apply Reciprocal Rank Fusion to any number of ranked id lists
///
/// RRF formula: score(id) = sum over the rankings containing id of 1 / (k + rank),
/// with 1-based ranks.
///
/// # Returns
/// Fused `(id, score)` pairs sorted by score descending. Equal scores keep
/// the order in which ids were first seen.
pub fn reciprocal_rank_fusion<S: AsRef<str>>(
    rankings: &[Vec<S>],
    config: &FusionConfig,
) -> Vec<(String, f64)> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();

    for ranking in rankings {
        for (rank, id) in ranking.iter().take(config.rank_window_size).enumerate() {
            let id = id.as_ref();
            let rrf_score = 1.0 / (config.rank_constant + (rank as f64) + 1.0);
            match scores.get_mut(id) {
                Some(score) => *score += rrf_score,
                None => {
                    scores.insert(id, rrf_score);
                    first_seen.push(id);
                }
            }
        }
    }

    let mut results: Vec<(String, f64)> = first_seen
        .into_iter()
        .map(|id| (id.to_string(), scores[id]))
        .collect();
    // sort_by is stable, so ties stay in first-seen order
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    results
}

/// Fuse hit lists, keeping each document's source and replacing its score
/// with the fused score
pub fn fuse_hits(rankings: Vec<Vec<RawHit>>, config: &FusionConfig) -> Vec<RawHit> {
    let ids: Vec<Vec<String>> = rankings
        .iter()
        .map(|hits| hits.iter().map(|h| h.id.clone()).collect())
        .collect();
    let fused = reciprocal_rank_fusion(&ids, config);

    let mut by_id: HashMap<String, RawHit> = HashMap::new();
    for hit in rankings.into_iter().flatten() {
        by_id.entry(hit.id.clone()).or_insert(hit);
    }

    fused
        .into_iter()
        .filter_map(|(id, score)| {
            by_id.remove(&id).map(|mut hit| {
                hit.score = Some(score);
                hit
            })
        })
        .collect()
}
