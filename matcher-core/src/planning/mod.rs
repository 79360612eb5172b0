//! # Candidate Planning
//!
//! Derives the set of season episodes worth comparing against, in tiers:
//! episodes already resolved in the rip spec, a disc-number-derived block,
//! and a full-season fallback when nothing else is available.


use tracing::debug;

use crate::external::SeasonInfo;
use crate::types::{MatchPolicy, PlanSource};

/// A ranked set of candidate episodes with per-tier telemetry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePlan {
    /// Union of all tiers, sorted ascending, unique, strictly positive
    pub episodes: Vec<u32>,
    /// Which tiers contributed, in tier order
    pub sources: Vec<PlanSource>,
    /// Tier 1: episodes already resolved in the rip spec
    pub rip_spec: Vec<u32>,
    /// Tiers 2/3: episodes derived from the disc number
    pub disc_block: Vec<u32>,
    /// Tier 4: every episode of the season
    pub season_fallback: Vec<u32>,
}

impl CandidatePlan {
    /// Whether any tier produced candidates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

/// Minimum disc-block size; small discs still get a workable window
const MIN_BLOCK_SIZE: usize = 4;

/// Build the candidate plan for one disc.
///
/// `episode_hints` carries one entry per rip-spec episode; `0` marks an
/// unresolved episode. `disc_number == 0` means the disc position is
/// unknown.
#[must_use]
pub fn plan_candidates(
    episode_hints: &[u32],
    season: &SeasonInfo,
    disc_number: u32,
    policy: &MatchPolicy,
) -> CandidatePlan {
    let mut plan = CandidatePlan::default();
    let season_len = season.episodes.len();
    let block = episode_hints.len().max(MIN_BLOCK_SIZE);

    // Tier 1: resolved episodes from the rip spec
    let mut rip_spec: Vec<u32> = episode_hints.iter().copied().filter(|&e| e > 0).collect();
    rip_spec.sort_unstable();
    rip_spec.dedup();
    plan.rip_spec = rip_spec;

    if disc_number >= 1 && season_len >= 1 {
        if plan.rip_spec.is_empty() {
            // Tier 3: estimate the block from the disc number alone, padded
            // to absorb off-by-a-few disc layouts
            let pad = policy
                .disc_block_padding_min
                .max(block / policy.disc_block_padding_divisor);
            let start = ((disc_number as usize - 1) * block)
                .saturating_sub(pad)
                .min(season_len);
            let end = (disc_number as usize * block + pad).min(season_len);
            plan.disc_block = season.episodes[start..end].iter().map(|e| e.number).collect();
        } else {
            // Tier 2: supplement the resolved episodes with the disc's block
            let start = ((disc_number as usize - 1) * block).min(season_len.saturating_sub(block));
            let end = (start + block).min(season_len);
            plan.disc_block = season.episodes[start..end].iter().map(|e| e.number).collect();
        }
    }

    // Tier 4: the whole season, only when nothing else populated
    if plan.rip_spec.is_empty() && plan.disc_block.is_empty() {
        plan.season_fallback = season.episodes.iter().map(|e| e.number).collect();
    }

    if !plan.rip_spec.is_empty() {
        plan.sources.push(PlanSource::RipSpec);
    }
    if !plan.disc_block.is_empty() {
        plan.sources.push(PlanSource::DiscBlock);
    }
    if !plan.season_fallback.is_empty() {
        plan.sources.push(PlanSource::SeasonFallback);
    }

    let mut episodes: Vec<u32> = plan
        .rip_spec
        .iter()
        .chain(plan.disc_block.iter())
        .chain(plan.season_fallback.iter())
        .copied()
        .filter(|&e| e > 0)
        .collect();
    episodes.sort_unstable();
    episodes.dedup();
    plan.episodes = episodes;

    debug!(
        disc = disc_number,
        rip_spec = plan.rip_spec.len(),
        disc_block = plan.disc_block.len(),
        season_fallback = plan.season_fallback.len(),
        total = plan.episodes.len(),
        "candidate plan built"
    );
    plan
}
