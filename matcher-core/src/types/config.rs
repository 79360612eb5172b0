// ============================================================================
// Configuration
// ============================================================================

use serde::Deserialize;

/// Tuning knobs for the matching engine.
///
/// All ratio-style fields must lie strictly inside `(0, 1)`; out-of-range
/// values fall back to the documented defaults via [`MatchPolicy::validated`].
///
/// # Examples
///
/// ```
/// use ripmatch_core::MatchPolicy;
///
/// // Default thresholds
/// let policy = MatchPolicy::default();
/// assert!((policy.min_similarity_score - 0.58).abs() < f64::EPSILON);
///
/// // Custom thresholds, normalized before use
/// let custom = MatchPolicy {
///     min_similarity_score: 0.65,
///     ..MatchPolicy::default()
/// }
/// .validated();
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Lower bound for accepting an assigned pair
    pub min_similarity_score: f64,
    /// Below this, a match is flagged for human review even if kept
    pub low_confidence_review_threshold: f64,
    /// Below this, LLM verification runs
    pub llm_verify_threshold: f64,
    /// Lowest best-score that can anchor
    pub anchor_min_score: f64,
    /// Minimum gap between best and second-best to anchor
    pub anchor_min_score_margin: f64,
    /// Score band below the maximum for the high-confidence set
    pub block_high_confidence_delta: f64,
    /// Top quantile gate for the high-confidence set
    pub block_high_confidence_top_ratio: f64,
    /// Minimum padding around the disc-block estimate
    pub disc_block_padding_min: usize,
    /// Divisor of the block size to compute padding
    pub disc_block_padding_divisor: usize,
    /// Enforce episode 1 for disc 1
    pub disc1_must_start_at_episode_1: bool,
    /// Disc 2+ may not start before this episode
    pub disc2_plus_min_start_episode: u32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            min_similarity_score: 0.58,
            low_confidence_review_threshold: 0.70,
            llm_verify_threshold: 0.85,
            anchor_min_score: 0.63,
            anchor_min_score_margin: 0.03,
            block_high_confidence_delta: 0.05,
            block_high_confidence_top_ratio: 0.70,
            disc_block_padding_min: 2,
            disc_block_padding_divisor: 4,
            disc1_must_start_at_episode_1: true,
            disc2_plus_min_start_episode: 2,
        }
    }
}

impl MatchPolicy {
    /// Replace out-of-range ratio fields with their defaults.
    ///
    /// Each replacement is logged so a misconfigured deployment is visible
    /// without failing the run.
    #[must_use]
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        let ratio_fields: [(&str, &mut f64, f64); 7] = [
            (
                "min_similarity_score",
                &mut self.min_similarity_score,
                defaults.min_similarity_score,
            ),
            (
                "low_confidence_review_threshold",
                &mut self.low_confidence_review_threshold,
                defaults.low_confidence_review_threshold,
            ),
            (
                "llm_verify_threshold",
                &mut self.llm_verify_threshold,
                defaults.llm_verify_threshold,
            ),
            (
                "anchor_min_score",
                &mut self.anchor_min_score,
                defaults.anchor_min_score,
            ),
            (
                "anchor_min_score_margin",
                &mut self.anchor_min_score_margin,
                defaults.anchor_min_score_margin,
            ),
            (
                "block_high_confidence_delta",
                &mut self.block_high_confidence_delta,
                defaults.block_high_confidence_delta,
            ),
            (
                "block_high_confidence_top_ratio",
                &mut self.block_high_confidence_top_ratio,
                defaults.block_high_confidence_top_ratio,
            ),
        ];

        for (name, value, default) in ratio_fields {
            if *value <= 0.0 || *value >= 1.0 {
                tracing::warn!(
                    field = name,
                    invalid = *value,
                    fallback = default,
                    "invalid policy ratio, falling back to default"
                );
                *value = default;
            }
        }

        if self.disc_block_padding_divisor == 0 {
            tracing::warn!(
                field = "disc_block_padding_divisor",
                fallback = defaults.disc_block_padding_divisor,
                "divisor must be positive, falling back to default"
            );
            self.disc_block_padding_divisor = defaults.disc_block_padding_divisor;
        }

        self
    }
}
