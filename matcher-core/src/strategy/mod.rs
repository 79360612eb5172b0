//! # Strategy Evaluation
//!
//! Runs the candidate, anchor, disc-block, and full-season strategies
//! end-to-end (references, IDF weighting, assignment, refinement) and picks
//! the best outcome. Coverage wins; quality breaks ties.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::anchor::AnchorSelection;
use crate::assignment::assign_fingerprints;
use crate::error::Result;
use crate::external::SeasonInfo;
use crate::fingerprint::IdfTable;
use crate::planning::CandidatePlan;
use crate::progress::ProgressFn;
use crate::references::{FetchContext, ReferenceFetcher};
use crate::refinement::refine_block;
use crate::types::{
    BlockRefinement, MatchPolicy, MatchResult, ReferenceFingerprint, RipFingerprint, StrategyKind,
    StrategyScore,
};

/// One named candidate-episode subset to evaluate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    /// Strategy name
    pub kind: StrategyKind,
    /// Where the episode list came from
    pub reason: String,
    /// Ordered unique candidate episodes
    pub episodes: Vec<u32>,
}

/// Everything one evaluated attempt produced
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    /// The attempt that ran
    pub attempt: StrategyAttempt,
    /// References the attempt compared against
    pub references: Vec<ReferenceFingerprint>,
    /// Matches after refinement
    pub matches: Vec<MatchResult>,
    /// Refinement record
    pub refinement: BlockRefinement,
    /// Arithmetic mean of match scores, 0 when no matches
    pub average_score: f64,
}

impl StrategyOutcome {
    /// Telemetry row for this outcome
    #[must_use]
    pub fn score_row(&self) -> StrategyScore {
        StrategyScore {
            strategy: self.attempt.kind,
            matches: self.matches.len(),
            average_score: self.average_score,
            needs_review: self.refinement.needs_review,
        }
    }
}

/// Build the attempt list in evaluation order.
///
/// Attempts with empty episode lists, or whose episode set repeats an
/// earlier attempt's, are skipped.
#[must_use]
pub fn build_attempts(
    plan: &CandidatePlan,
    anchor: Option<&AnchorSelection>,
    season: &SeasonInfo,
) -> Vec<StrategyAttempt> {
    let mut raw: Vec<StrategyAttempt> = Vec::new();

    raw.push(StrategyAttempt {
        kind: StrategyKind::RipspecSeed,
        reason: plan
            .sources
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("+"),
        episodes: plan.episodes.clone(),
    });

    if let Some(anchor) = anchor {
        raw.push(StrategyAttempt {
            kind: StrategyKind::AnchorWindow,
            reason: anchor.reason.as_str().to_string(),
            episodes: anchor.window_episodes(),
        });
    }

    raw.push(StrategyAttempt {
        kind: StrategyKind::DiscBlock,
        reason: "disc_position".to_string(),
        episodes: plan.disc_block.clone(),
    });

    raw.push(StrategyAttempt {
        kind: StrategyKind::FullSeason,
        reason: "season_sweep".to_string(),
        episodes: season.episodes.iter().map(|e| e.number).collect(),
    });

    let mut attempts: Vec<StrategyAttempt> = Vec::new();
    for attempt in raw {
        if attempt.episodes.is_empty() {
            continue;
        }
        if attempts.iter().any(|prior| prior.episodes == attempt.episodes) {
            debug!(
                strategy = attempt.kind.as_str(),
                "episode set repeats an earlier attempt, skipped"
            );
            continue;
        }
        attempts.push(attempt);
    }
    attempts
}

/// Evaluate every attempt against the rips.
///
/// The season-wide references fetched for the anchor pass act as a cache:
/// an attempt whose episodes are covered there never re-fetches.
///
/// # Errors
///
/// Returns [`crate::Error::Cancelled`] when the token fires; solver errors
/// propagate as internal errors.
#[instrument(skip_all, fields(attempts = attempts.len(), rips = rips.len()))]
#[allow(clippy::too_many_arguments)]
pub async fn evaluate_strategies(
    attempts: &[StrategyAttempt],
    rips: &[RipFingerprint],
    season_refs: &[ReferenceFingerprint],
    fetcher: &ReferenceFetcher,
    ctx: &FetchContext,
    season: &SeasonInfo,
    disc_number: u32,
    policy: &MatchPolicy,
    cancel: &CancellationToken,
    progress: Option<&ProgressFn>,
) -> Result<Vec<StrategyOutcome>> {
    let mut outcomes = Vec::new();
    for attempt in attempts {
        let outcome = evaluate_one(
            attempt,
            rips,
            season_refs,
            fetcher,
            ctx,
            season,
            disc_number,
            policy,
            cancel,
            progress,
        )
        .await?;
        debug!(
            strategy = attempt.kind.as_str(),
            matches = outcome.matches.len(),
            average = outcome.average_score,
            needs_review = outcome.refinement.needs_review,
            "strategy evaluated"
        );
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[allow(clippy::too_many_arguments)]
async fn evaluate_one(
    attempt: &StrategyAttempt,
    rips: &[RipFingerprint],
    season_refs: &[ReferenceFingerprint],
    fetcher: &ReferenceFetcher,
    ctx: &FetchContext,
    season: &SeasonInfo,
    disc_number: u32,
    policy: &MatchPolicy,
    cancel: &CancellationToken,
    progress: Option<&ProgressFn>,
) -> Result<StrategyOutcome> {
    // Reuse the season-wide cache before going back to the source
    let mut references: Vec<ReferenceFingerprint> = season_refs
        .iter()
        .filter(|r| attempt.episodes.contains(&r.episode_number))
        .cloned()
        .collect();
    if references.is_empty() {
        references = fetcher
            .fetch_episodes(ctx, &attempt.episodes, season, cancel, progress)
            .await?;
    }

    // Damp vocabulary common across the attempt window, not the whole season
    let mut rips: Vec<RipFingerprint> = rips.to_vec();
    match IdfTable::build(references.iter().map(|r| &r.raw_vector)) {
        Some(idf) => {
            for rip in &mut rips {
                rip.apply_idf(&idf);
            }
            for reference in &mut references {
                reference.apply_idf(&idf);
            }
        }
        None => {
            for rip in &mut rips {
                rip.clear_idf();
            }
            for reference in &mut references {
                reference.clear_idf();
            }
        }
    }

    let matches = assign_fingerprints(&rips, &references, policy.min_similarity_score)?;
    let (matches, refinement) = if matches.is_empty() {
        (matches, BlockRefinement::default())
    } else {
        refine_block(
            matches,
            &rips,
            &references,
            disc_number,
            season.episode_count(),
            policy,
        )?
    };

    let average_score = if matches.is_empty() {
        0.0
    } else {
        matches.iter().map(|m| m.score).sum::<f64>() / matches.len() as f64
    };

    Ok(StrategyOutcome {
        attempt: attempt.clone(),
        references,
        matches,
        refinement,
        average_score,
    })
}

/// Pick the winning outcome: most matches, then higher mean score, then no
/// review flag. Ties keep the earlier attempt.
#[must_use]
pub fn select_best(outcomes: &[StrategyOutcome]) -> Option<&StrategyOutcome> {
    let mut best: Option<&StrategyOutcome> = None;
    for outcome in outcomes {
        let Some(current) = best else {
            best = Some(outcome);
            continue;
        };
        if beats(outcome, current) {
            best = Some(outcome);
        }
    }
    best
}

/// Mean scores closer than this count as a tie; strategies over different
/// reference windows reproduce the same cosine up to rounding
const SCORE_TIE_EPSILON: f64 = 1e-9;

fn beats(challenger: &StrategyOutcome, incumbent: &StrategyOutcome) -> bool {
    if challenger.matches.len() != incumbent.matches.len() {
        return challenger.matches.len() > incumbent.matches.len();
    }
    if (challenger.average_score - incumbent.average_score).abs() > SCORE_TIE_EPSILON {
        return challenger.average_score > incumbent.average_score;
    }
    !challenger.refinement.needs_review && incumbent.refinement.needs_review
}
