//! # Anchor Selection
//!
//! Picks a single high-confidence rip-to-reference pair to pin the disc's
//! contiguous window inside the season. The first rip is tried first; the
//! second rip is a fallback for discs whose opening episode transcribed
//! badly.


use tracing::debug;

use crate::fingerprint::cosine;
use crate::types::{AnchorFailure, AnchorReason, MatchPolicy, ReferenceFingerprint, RipFingerprint};

/// A successful anchor with its derived window
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSelection {
    /// Index of the anchoring rip (0 or 1)
    pub rip_index: usize,
    /// Episode the anchoring rip matched
    pub target_episode: u32,
    /// Best cosine score of the attempt
    pub best_score: f64,
    /// Runner-up cosine score
    pub second_best_score: f64,
    /// `best_score − second_best_score`
    pub score_margin: f64,
    /// First episode of the derived window
    pub window_start: u32,
    /// Last episode of the derived window
    pub window_end: u32,
    /// Which attempt anchored
    pub reason: AnchorReason,
}

impl AnchorSelection {
    /// Episode numbers of the window, ascending
    #[must_use]
    pub fn window_episodes(&self) -> Vec<u32> {
        (self.window_start..=self.window_end).collect()
    }
}

/// Attempt to anchor the disc window on the season-wide reference list.
///
/// Tries rip 0, then rip 1 when present. An attempt succeeds when its best
/// score clears `anchor_min_score` and leads the runner-up by at least
/// `anchor_min_score_margin`.
///
/// # Errors
///
/// Returns the failure reason of the last attempt when no rip anchors.
pub fn select_anchor(
    rips: &[RipFingerprint],
    season_refs: &[ReferenceFingerprint],
    season_len: u32,
    policy: &MatchPolicy,
) -> Result<AnchorSelection, AnchorFailure> {
    if rips.is_empty() {
        return Err(AnchorFailure::NoCandidates);
    }

    let attempts = if rips.len() >= 2 { 2 } else { 1 };
    let mut failure = AnchorFailure::NoCandidates;

    for rip_index in 0..attempts {
        match attempt_anchor(rip_index, rips, season_refs, season_len, policy) {
            Ok(selection) => {
                debug!(
                    rip_index,
                    target = selection.target_episode,
                    best = selection.best_score,
                    margin = selection.score_margin,
                    window_start = selection.window_start,
                    window_end = selection.window_end,
                    "anchor accepted"
                );
                return Ok(selection);
            }
            Err(reason) => {
                debug!(rip_index, reason = reason.as_str(), "anchor attempt failed");
                failure = reason;
            }
        }
    }
    Err(failure)
}

fn attempt_anchor(
    rip_index: usize,
    rips: &[RipFingerprint],
    season_refs: &[ReferenceFingerprint],
    season_len: u32,
    policy: &MatchPolicy,
) -> Result<AnchorSelection, AnchorFailure> {
    let rip = &rips[rip_index];
    if rip.vector.is_empty() {
        return Err(AnchorFailure::NoCandidates);
    }

    let mut best_score = 0.0_f64;
    let mut best_episode = 0_u32;
    let mut second_best = 0.0_f64;
    let mut scored_any = false;

    for reference in season_refs {
        if reference.vector.is_empty() {
            continue;
        }
        scored_any = true;
        let score = cosine(&rip.vector, &reference.vector);
        if score > best_score {
            second_best = best_score;
            best_score = score;
            best_episode = reference.episode_number;
        } else if score > second_best {
            second_best = score;
        }
    }

    if !scored_any {
        return Err(AnchorFailure::NoCandidates);
    }
    if best_score < policy.anchor_min_score {
        return Err(AnchorFailure::ScoreBelowThreshold);
    }
    let margin = best_score - second_best;
    if margin < policy.anchor_min_score_margin {
        return Err(AnchorFailure::ScoreAmbiguous);
    }

    let rip_count = rips.len() as u32;
    let mut window_start = best_episode.saturating_sub(rip_index as u32).max(1);
    if season_len >= 1 {
        let latest_start = season_len.saturating_sub(rip_count).saturating_add(1).max(1);
        window_start = window_start.min(latest_start);
    }
    let mut window_end = window_start + rip_count - 1;
    if season_len >= 1 {
        window_end = window_end.min(season_len);
    }

    Ok(AnchorSelection {
        rip_index,
        target_episode: best_episode,
        best_score,
        second_best_score: second_best,
        score_margin: margin,
        window_start,
        window_end,
        reason: if rip_index == 0 {
            AnchorReason::FirstAnchor
        } else {
            AnchorReason::SecondAnchor
        },
    })
}
