//! # Type Tests
//!
//! Unit tests for policy validation and the shared data model.

#[cfg(test)]
mod tests {
    use crate::types::{
        AnchorFailure, MatchOutcome, MatchPolicy, PlanSource, StrategyKind,
    };

    #[test]
    fn policy_defaults_match_documentation() {
        let policy = MatchPolicy::default();
        assert!((policy.min_similarity_score - 0.58).abs() < f64::EPSILON);
        assert!((policy.low_confidence_review_threshold - 0.70).abs() < f64::EPSILON);
        assert!((policy.llm_verify_threshold - 0.85).abs() < f64::EPSILON);
        assert!((policy.anchor_min_score - 0.63).abs() < f64::EPSILON);
        assert!((policy.anchor_min_score_margin - 0.03).abs() < f64::EPSILON);
        assert!((policy.block_high_confidence_delta - 0.05).abs() < f64::EPSILON);
        assert!((policy.block_high_confidence_top_ratio - 0.70).abs() < f64::EPSILON);
        assert_eq!(policy.disc_block_padding_min, 2);
        assert_eq!(policy.disc_block_padding_divisor, 4);
        assert!(policy.disc1_must_start_at_episode_1);
        assert_eq!(policy.disc2_plus_min_start_episode, 2);
    }

    #[test]
    fn invalid_ratios_fall_back_to_defaults() {
        let policy = MatchPolicy {
            min_similarity_score: 0.0,
            llm_verify_threshold: 1.0,
            anchor_min_score: -0.4,
            block_high_confidence_top_ratio: 3.2,
            ..MatchPolicy::default()
        }
        .validated();

        let defaults = MatchPolicy::default();
        assert!((policy.min_similarity_score - defaults.min_similarity_score).abs() < f64::EPSILON);
        assert!((policy.llm_verify_threshold - defaults.llm_verify_threshold).abs() < f64::EPSILON);
        assert!((policy.anchor_min_score - defaults.anchor_min_score).abs() < f64::EPSILON);
        assert!(
            (policy.block_high_confidence_top_ratio - defaults.block_high_confidence_top_ratio)
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn valid_ratios_survive_validation() {
        let policy = MatchPolicy {
            min_similarity_score: 0.61,
            anchor_min_score_margin: 0.10,
            ..MatchPolicy::default()
        }
        .validated();
        assert!((policy.min_similarity_score - 0.61).abs() < f64::EPSILON);
        assert!((policy.anchor_min_score_margin - 0.10).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_padding_divisor_falls_back() {
        let policy = MatchPolicy {
            disc_block_padding_divisor: 0,
            ..MatchPolicy::default()
        }
        .validated();
        assert_eq!(policy.disc_block_padding_divisor, 4);
    }

    #[test]
    fn policy_deserializes_with_partial_fields() {
        let policy: MatchPolicy =
            serde_json::from_str(r#"{"min_similarity_score": 0.62}"#).unwrap();
        assert!((policy.min_similarity_score - 0.62).abs() < f64::EPSILON);
        assert!((policy.llm_verify_threshold - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn flag_review_accumulates_reasons() {
        let mut outcome = MatchOutcome::default();
        assert!(!outcome.needs_review);

        outcome.flag_review("first reason");
        outcome.flag_review("second reason");
        assert!(outcome.needs_review);
        assert_eq!(outcome.review_reasons.len(), 2);
    }

    #[test]
    fn telemetry_tags_are_stable() {
        assert_eq!(PlanSource::RipSpec.as_str(), "rip_spec");
        assert_eq!(PlanSource::DiscBlock.as_str(), "disc_block");
        assert_eq!(PlanSource::SeasonFallback.as_str(), "season_fallback");
        assert_eq!(StrategyKind::RipspecSeed.as_str(), "ripspec_seed");
        assert_eq!(StrategyKind::AnchorWindow.as_str(), "anchor_window");
        assert_eq!(StrategyKind::DiscBlock.as_str(), "disc_block");
        assert_eq!(StrategyKind::FullSeason.as_str(), "full_season");
        assert_eq!(
            AnchorFailure::ScoreBelowThreshold.as_str(),
            "anchor_score_below_threshold"
        );
        assert_eq!(AnchorFailure::ScoreAmbiguous.as_str(), "anchor_score_ambiguous");
    }
}
