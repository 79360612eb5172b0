//! Write-back of accepted matches onto the rip spec.
//!
//! This is the only place the pipeline mutates the spec; every earlier
//! stage works on local state so failed runs leave the input untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::external::SeasonInfo;
use crate::progress::{ProgressFn, ProgressPhase, ProgressUpdate};
use crate::ripspec::{ContentIdMatch, RipSpec};
use crate::types::{MatchResult, StrategyKind, StrategyScore};

/// Identification method tag written into the attributes
const METHOD_TAG: &str = "transcript_reference";

#[allow(clippy::too_many_arguments)]
pub(super) fn apply_matches(
    spec: &mut RipSpec,
    matches: &[MatchResult],
    season: &SeasonInfo,
    transcripts: &BTreeMap<String, PathBuf>,
    selected: StrategyKind,
    strategy_scores: &[StrategyScore],
    review_reasons: &[String],
    progress: Option<&ProgressFn>,
) {
    let show_title = spec.metadata.show_title.clone();
    let season_number = spec.metadata.season_number;

    for (index, m) in matches.iter().enumerate() {
        if let Some(report) = progress {
            report(ProgressUpdate {
                phase: ProgressPhase::Apply,
                current: index + 1,
                total: matches.len(),
                episode_key: m.episode_key.clone(),
            });
        }

        let info = season.episode(m.target_episode);
        let episode_title = info.map(|e| e.title.clone()).filter(|t| !t.is_empty());
        let air_date = info.and_then(|e| e.air_date);
        let basename = format!(
            "{show_title} - s{season_number:02}e{target:02}",
            target = m.target_episode
        );

        if let Some(episode) = spec.episode_mut(&m.episode_key) {
            episode.season = season_number;
            episode.episode = m.target_episode;
            episode.episode_title = episode_title.clone();
            episode.episode_air_date = air_date;
            episode.output_basename = Some(basename);
            episode.match_confidence = Some(m.score);
        }
        if let Some(title) = spec.title_mut(m.title_id) {
            title.season = Some(season_number);
            title.episode = Some(m.target_episode);
            title.episode_title = episode_title;
            title.episode_air_date = air_date;
        }
    }

    spec.attributes.content_id_matches = matches.iter().map(ContentIdMatch::from).collect();
    spec.attributes.content_id_method = Some(METHOD_TAG.to_string());
    spec.attributes.content_id_transcripts = transcripts.clone();
    spec.attributes.content_id_selected_strategy = Some(selected.as_str().to_string());
    spec.attributes.content_id_strategy_scores = strategy_scores
        .iter()
        .map(|s| (s.strategy.as_str().to_string(), s.average_score))
        .collect();
    spec.attributes.episodes_synchronized = true;
    for reason in review_reasons {
        spec.attributes.flag_review(reason);
    }
}
