use serde::{Deserialize, Serialize};

/// Which planning tier contributed episodes to a candidate plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Episodes already resolved in the rip spec
    RipSpec,
    /// Episodes derived from the disc number
    DiscBlock,
    /// Every episode of the season
    SeasonFallback,
}

impl PlanSource {
    /// Stable tag used in telemetry
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlanSource::RipSpec => "rip_spec",
            PlanSource::DiscBlock => "disc_block",
            PlanSource::SeasonFallback => "season_fallback",
        }
    }
}

/// Why an anchor selection succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorReason {
    /// The first rip anchored the window
    FirstAnchor,
    /// The first rip failed, the second rip anchored the window
    SecondAnchor,
}

impl AnchorReason {
    /// Stable tag used in telemetry
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnchorReason::FirstAnchor => "first_anchor",
            AnchorReason::SecondAnchor => "second_anchor",
        }
    }
}

/// Why an anchor selection failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorFailure {
    /// No rip or reference fingerprint had usable content
    NoCandidates,
    /// Best score under `anchor_min_score`
    ScoreBelowThreshold,
    /// Gap between best and second-best under `anchor_min_score_margin`
    ScoreAmbiguous,
}

impl AnchorFailure {
    /// Stable tag used in review reasons
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnchorFailure::NoCandidates => "anchor_no_candidates",
            AnchorFailure::ScoreBelowThreshold => "anchor_score_below_threshold",
            AnchorFailure::ScoreAmbiguous => "anchor_score_ambiguous",
        }
    }
}

/// Named candidate-episode strategies, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Union of the candidate plan's tiers
    RipspecSeed,
    /// Contiguous window pinned by a successful anchor
    AnchorWindow,
    /// The candidate plan's disc-block tier
    DiscBlock,
    /// Every episode of the season
    FullSeason,
}

impl StrategyKind {
    /// Stable tag used in telemetry
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::RipspecSeed => "ripspec_seed",
            StrategyKind::AnchorWindow => "anchor_window",
            StrategyKind::DiscBlock => "disc_block",
            StrategyKind::FullSeason => "full_season",
        }
    }
}

/// Verification state of a match after the LLM pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// Score cleared the verification threshold, or the LLM agreed
    Confirmed,
    /// Score under the threshold, awaiting the LLM verdict
    Challenged,
    /// The LLM disagreed with the cosine assignment
    Rejected,
    /// A rejected rip was reassigned through cross-matching
    Rematched,
}
