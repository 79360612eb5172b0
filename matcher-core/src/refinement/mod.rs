//! # Block Refinement
//!
//! Forces the assignment onto a contiguous run of exactly `|rips|` episode
//! numbers, because a single disc holds a consecutive slice of a season.
//! Matches outside the chosen block are reassigned into the block's gaps;
//! ambiguity raises the review flag instead of failing.

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::assignment::assign_matrix;
use crate::error::Result;
use crate::fingerprint::cosine;
use crate::types::{
    BlockRefinement, MatchPolicy, MatchResult, ReferenceFingerprint, RipFingerprint,
};

/// Review reason when disc 1 cannot start at episode 1
const REASON_DISC1_OUTSIDE_RANGE: &str = "disc 1 anchor outside valid high-confidence range";
/// Review reason when displaced and gap counts disagree
const REASON_COUNT_MISMATCH: &str = "displaced count does not match gap count";
/// Review reason when displaced matches exist but the block is full
const REASON_NO_GAPS: &str = "displaced matches with no gaps in block";

/// Refine a match set into a contiguous episode block.
///
/// Returns the (possibly rewritten) matches together with the refinement
/// record. The refiner may lower scores (second-round similarities are
/// genuine measurements) but never fabricates non-zero ones; positional
/// assignments carry `score = 0`.
///
/// # Errors
///
/// Propagates solver dimension errors from the gap-filling pass.
pub fn refine_block(
    matches: Vec<MatchResult>,
    rips: &[RipFingerprint],
    refs: &[ReferenceFingerprint],
    disc_number: u32,
    season_len: u32,
    policy: &MatchPolicy,
) -> Result<(Vec<MatchResult>, BlockRefinement)> {
    let mut record = BlockRefinement::default();
    if matches.len() < 2 || rips.is_empty() {
        return Ok((matches, record));
    }

    let high_confidence = high_confidence_set(&matches, policy);
    if high_confidence.len() < 2 {
        debug!(
            high_confidence = high_confidence.len(),
            "too few high-confidence matches, refinement skipped"
        );
        return Ok((matches, record));
    }

    let hc_min = high_confidence
        .iter()
        .map(|m| m.target_episode)
        .min()
        .unwrap_or(1);
    let hc_max = high_confidence
        .iter()
        .map(|m| m.target_episode)
        .max()
        .unwrap_or(1);

    let rip_count = rips.len() as u32;
    let valid_low = hc_max.saturating_sub(rip_count).saturating_add(1).max(1);
    let valid_high = hc_min;

    let high_keys: HashSet<&str> = high_confidence.iter().map(|m| m.episode_key.as_str()).collect();
    let block_start = choose_block_start(
        &matches,
        &high_keys,
        disc_number,
        season_len,
        rip_count,
        valid_low,
        valid_high,
        hc_min,
        hc_max,
        policy,
        &mut record,
    );
    let block_end = (block_start + rip_count - 1).min(season_len.max(block_start));
    record.block_start = block_start;
    record.block_end = block_end;

    let (valid, displaced): (Vec<MatchResult>, Vec<MatchResult>) = matches
        .iter()
        .cloned()
        .partition(|m| (block_start..=block_end).contains(&m.target_episode));

    record.displaced = displaced.len();
    if displaced.is_empty() {
        return Ok((matches, record));
    }

    let claimed: HashSet<u32> = valid.iter().map(|m| m.target_episode).collect();
    let gaps: Vec<u32> = (block_start..=block_end)
        .filter(|e| !claimed.contains(e))
        .collect();
    record.gaps = gaps.len();

    if gaps.is_empty() {
        // Fully covered block with leftovers; keep the original set intact
        record.needs_review = true;
        record.review_reason = join_reason(&record.review_reason, REASON_NO_GAPS);
        return Ok((matches, record));
    }

    if displaced.len() != gaps.len() {
        record.needs_review = true;
        record.review_reason = join_reason(&record.review_reason, REASON_COUNT_MISMATCH);
    }

    let reassigned = fill_gaps(&displaced, &gaps, rips, refs)?;
    record.reassigned = reassigned.len();
    debug!(
        block_start,
        block_end,
        displaced = record.displaced,
        gaps = record.gaps,
        reassigned = record.reassigned,
        "block refinement rewrote displaced matches"
    );

    let mut refined: Vec<MatchResult> = valid.into_iter().chain(reassigned).collect();
    sort_by_rip_order(&mut refined, rips);
    Ok((refined, record))
}

/// Matches inside both the delta band below the maximum score and the top
/// quantile by score; the intersection is the more selective of the two
/// bounds.
fn high_confidence_set<'a>(
    matches: &'a [MatchResult],
    policy: &MatchPolicy,
) -> Vec<&'a MatchResult> {
    let max_score = matches.iter().map(|m| m.score).fold(0.0_f64, f64::max);
    let delta_floor = max_score - policy.block_high_confidence_delta;

    // Quantile gate by score value, so ties never get sliced arbitrarily
    let mut scores: Vec<f64> = matches.iter().map(|m| m.score).collect();
    scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((policy.block_high_confidence_top_ratio * matches.len() as f64).ceil() as usize)
        .clamp(1, matches.len());
    let quantile_floor = scores[rank - 1];

    matches
        .iter()
        .filter(|m| m.score >= delta_floor && m.score >= quantile_floor)
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn choose_block_start(
    matches: &[MatchResult],
    high_keys: &HashSet<&str>,
    disc_number: u32,
    season_len: u32,
    rip_count: u32,
    valid_low: u32,
    valid_high: u32,
    hc_min: u32,
    hc_max: u32,
    policy: &MatchPolicy,
    record: &mut BlockRefinement,
) -> u32 {
    let latest_start = season_len.saturating_sub(rip_count).saturating_add(1).max(1);

    if disc_number == 1 && policy.disc1_must_start_at_episode_1 {
        if valid_low > 1 || valid_high < 1 {
            record.needs_review = true;
            record.review_reason =
                join_reason(&record.review_reason, REASON_DISC1_OUTSIDE_RANGE);
        }
        return 1;
    }

    if disc_number >= 2 {
        let mut start = valid_high;
        let displaced_below = matches.iter().any(|m| {
            !high_keys.contains(m.episode_key.as_str()) && m.target_episode < hc_min
        });
        let displaced_above = matches.iter().any(|m| {
            !high_keys.contains(m.episode_key.as_str()) && m.target_episode > hc_max
        });
        if displaced_below {
            start = valid_low;
        } else if displaced_above {
            start = valid_high;
        }
        return start
            .max(policy.disc2_plus_min_start_episode)
            .min(latest_start)
            .max(1);
    }

    // Unknown disc position
    hc_min.min(latest_start).max(1)
}

/// Second assignment round: displaced rips against the gap episodes.
///
/// Gaps with a reference go through a Hungarian solve on genuine
/// similarities; reference-less gaps are filled positionally at score 0.
/// Excess on either side is dropped.
fn fill_gaps(
    displaced: &[MatchResult],
    gaps: &[u32],
    rips: &[RipFingerprint],
    refs: &[ReferenceFingerprint],
) -> Result<Vec<MatchResult>> {
    let rip_by_key: HashMap<&str, &RipFingerprint> =
        rips.iter().map(|r| (r.episode_key.as_str(), r)).collect();
    let ref_by_episode: HashMap<u32, &ReferenceFingerprint> =
        refs.iter().map(|r| (r.episode_number, r)).collect();

    let (solvable_gaps, bare_gaps): (Vec<u32>, Vec<u32>) = gaps
        .iter()
        .copied()
        .partition(|g| ref_by_episode.contains_key(g));

    let mut assigned: Vec<MatchResult> = Vec::new();
    let mut leftover: Vec<&MatchResult> = Vec::new();

    if solvable_gaps.is_empty() {
        leftover.extend(displaced.iter());
    } else {
        let similarity: Vec<Vec<f64>> = displaced
            .iter()
            .map(|m| {
                let rip_vector = rip_by_key.get(m.episode_key.as_str()).map(|r| &r.vector);
                solvable_gaps
                    .iter()
                    .map(|gap| {
                        let reference = ref_by_episode[gap];
                        rip_vector.map_or(0.0, |v| cosine(v, &reference.vector))
                    })
                    .collect()
            })
            .collect();

        let pairs = assign_matrix(&similarity, displaced.len(), solvable_gaps.len(), 0.0)?;
        let mut used_rows: HashSet<usize> = HashSet::new();
        for pair in pairs {
            let original = &displaced[pair.rip_index];
            let gap_episode = solvable_gaps[pair.ref_index];
            let reference = ref_by_episode[&gap_episode];
            let mut rewritten = MatchResult {
                episode_key: original.episode_key.clone(),
                title_id: original.title_id,
                target_episode: gap_episode,
                score: pair.score,
                file_id: None,
                language: None,
                cache_path: None,
            };
            rewritten.attach_reference(reference);
            assigned.push(rewritten);
            used_rows.insert(pair.rip_index);
        }
        leftover.extend(
            displaced
                .iter()
                .enumerate()
                .filter(|(i, _)| !used_rows.contains(i))
                .map(|(_, m)| m),
        );
    }

    // Positional fill for gaps no reference could score
    for (original, gap_episode) in leftover.into_iter().zip(bare_gaps) {
        assigned.push(MatchResult {
            episode_key: original.episode_key.clone(),
            title_id: original.title_id,
            target_episode: gap_episode,
            score: 0.0,
            file_id: None,
            language: None,
            cache_path: None,
        });
    }

    Ok(assigned)
}

fn sort_by_rip_order(matches: &mut [MatchResult], rips: &[RipFingerprint]) {
    let order: HashMap<&str, usize> = rips
        .iter()
        .enumerate()
        .map(|(i, r)| (r.episode_key.as_str(), i))
        .collect();
    matches.sort_by_key(|m| order.get(m.episode_key.as_str()).copied().unwrap_or(usize::MAX));
}

fn join_reason(existing: &str, addition: &str) -> String {
    if existing.is_empty() {
        addition.to_string()
    } else {
        format!("{existing}; {addition}")
    }
}
