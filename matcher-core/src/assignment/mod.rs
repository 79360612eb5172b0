//! # Assignment Solver
//!
//! Optimal bipartite assignment of rips to reference episodes on a
//! `1 − similarity` cost matrix.
//!
//! Greedy picking can mis-swap near-equal pairs; the bipartite optimum
//! avoids that while still preferring high-similarity cells. Cells without a
//! usable similarity carry a pad cost strictly above any real cost, so the
//! optimizer only touches them when no real cell is available.

pub mod hungarian;


use tracing::debug;

use crate::error::Result;
use crate::fingerprint::cosine;
use crate::types::{MatchResult, ReferenceFingerprint, RipFingerprint};

/// Cost of a padded cell; strictly above any real `1 − similarity`
pub const PAD_COST: f64 = 2.0;

/// One accepted row/column pair with its similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignedPair {
    /// Row index into the rip list
    pub rip_index: usize,
    /// Column index into the reference list
    pub ref_index: usize,
    /// Similarity of the pair
    pub score: f64,
}

/// Solve the assignment for a pre-computed similarity matrix.
///
/// The matrix is `n_rips × n_refs`; it is padded square internally. Pairs
/// landing on pads, outside the real ranges, or under `min_score` are
/// dropped. Results come back in row order.
///
/// # Errors
///
/// Returns [`crate::Error::Internal`] when `similarity` does not have the
/// stated dimensions.
pub fn assign_matrix(
    similarity: &[Vec<f64>],
    n_rips: usize,
    n_refs: usize,
    min_score: f64,
) -> Result<Vec<AssignedPair>> {
    if n_rips == 0 || n_refs == 0 {
        return Ok(Vec::new());
    }
    if similarity.len() != n_rips || similarity.iter().any(|row| row.len() != n_refs) {
        return Err(crate::error::Error::Internal(format!(
            "similarity matrix dimensions do not match {n_rips} rips x {n_refs} refs"
        )));
    }

    let n = n_rips.max(n_refs);
    let mut cost = vec![vec![PAD_COST; n]; n];
    for (i, row) in similarity.iter().enumerate() {
        for (j, &sim) in row.iter().enumerate() {
            if sim > 0.0 {
                cost[i][j] = (1.0 - sim).clamp(0.0, 1.0);
            }
        }
    }

    let assign = hungarian::solve(&cost)?;

    let mut pairs = Vec::new();
    for (i, &j) in assign.iter().enumerate().take(n_rips) {
        if j >= n_refs {
            continue;
        }
        let score = similarity[i][j];
        if score <= 0.0 {
            continue;
        }
        if score < min_score {
            debug!(
                rip = i,
                reference = j,
                score,
                min_score,
                "assignment under similarity threshold, dropped"
            );
            continue;
        }
        pairs.push(AssignedPair {
            rip_index: i,
            ref_index: j,
            score,
        });
    }
    Ok(pairs)
}

/// Compute the similarity matrix between rip and reference vectors
#[must_use]
pub fn similarity_matrix(
    rips: &[RipFingerprint],
    refs: &[ReferenceFingerprint],
) -> Vec<Vec<f64>> {
    rips.iter()
        .map(|rip| {
            refs.iter()
                .map(|reference| cosine(&rip.vector, &reference.vector))
                .collect()
        })
        .collect()
}

/// Assign rips to references and emit match results in row order.
///
/// # Errors
///
/// Propagates solver dimension errors; these indicate a programmer error.
pub fn assign_fingerprints(
    rips: &[RipFingerprint],
    refs: &[ReferenceFingerprint],
    min_score: f64,
) -> Result<Vec<MatchResult>> {
    let similarity = similarity_matrix(rips, refs);
    let pairs = assign_matrix(&similarity, rips.len(), refs.len(), min_score)?;

    Ok(pairs
        .into_iter()
        .map(|pair| {
            let rip = &rips[pair.rip_index];
            let reference = &refs[pair.ref_index];
            let mut result = MatchResult {
                episode_key: rip.episode_key.clone(),
                title_id: rip.title_id,
                target_episode: reference.episode_number,
                score: pair.score,
                file_id: None,
                language: None,
                cache_path: None,
            };
            result.attach_reference(reference);
            result
        })
        .collect())
}
