//! # Reference Fetching
//!
//! Obtains one reference fingerprint per candidate episode through the
//! search/download/cache collaborators. Failures for individual episodes
//! are degraded, not fatal: the episode is omitted and the strategy
//! evaluator copes with the partial set.


use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::external::{
    EpisodeInfo, ReferenceCache, ReferenceSource, SeasonInfo, SubtitleCandidate, SubtitleNormalizer,
    SubtitleQuery,
};
use crate::fingerprint::Fingerprint;
use crate::progress::{ProgressFn, ProgressPhase, ProgressUpdate};
use crate::types::ReferenceFingerprint;

/// Minimum title length for the cross-episode release-name exclusion rule
const MIN_TITLE_MATCH_LEN: usize = 5;

/// Show-level context shared by every episode request
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Show title as known to the metadata provider
    pub show_title: String,
    /// TMDB id of the show
    pub tmdb_id: u64,
    /// Season being matched
    pub season_number: u32,
    /// First-air year, when known
    pub year: Option<u32>,
}

/// Fetches and fingerprints reference subtitles for candidate episodes
pub struct ReferenceFetcher {
    source: Arc<dyn ReferenceSource>,
    cache: Arc<dyn ReferenceCache>,
    normalizer: Arc<dyn SubtitleNormalizer>,
    languages: Vec<String>,
}

impl ReferenceFetcher {
    /// Create a fetcher over the injected collaborators
    #[must_use]
    pub fn new(
        source: Arc<dyn ReferenceSource>,
        cache: Arc<dyn ReferenceCache>,
        normalizer: Arc<dyn SubtitleNormalizer>,
        languages: Vec<String>,
    ) -> Self {
        Self {
            source,
            cache,
            normalizer,
            languages,
        }
    }

    /// Fetch reference fingerprints for a set of candidate episodes.
    ///
    /// Each episode is requested once; episodes without a usable reference
    /// are omitted from the result. Results come back in ascending episode
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the token fires; per-episode
    /// failures are logged and tolerated.
    pub async fn fetch_episodes(
        &self,
        ctx: &FetchContext,
        episodes: &[u32],
        season: &SeasonInfo,
        cancel: &CancellationToken,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<ReferenceFingerprint>> {
        let mut fetched = Vec::new();
        for (index, &episode_number) in episodes.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(report) = progress {
                report(ProgressUpdate {
                    phase: ProgressPhase::Reference,
                    current: index + 1,
                    total: episodes.len(),
                    episode_key: format!("s{:02}e{:02}", ctx.season_number, episode_number),
                });
            }
            match self.fetch_one(ctx, episode_number, season, cancel).await {
                Ok(Some(reference)) => fetched.push(reference),
                Ok(None) => {
                    debug!(episode = episode_number, "no usable reference subtitle");
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    warn!(
                        episode = episode_number,
                        error = %err,
                        "reference fetch failed, episode omitted"
                    );
                }
            }
        }
        Ok(fetched)
    }

    async fn fetch_one(
        &self,
        ctx: &FetchContext,
        episode_number: u32,
        season: &SeasonInfo,
        cancel: &CancellationToken,
    ) -> Result<Option<ReferenceFingerprint>> {
        let query = SubtitleQuery {
            show_title: ctx.show_title.clone(),
            parent_id: ctx.tmdb_id,
            season: ctx.season_number,
            episode: episode_number,
            languages: self.languages.clone(),
            year: ctx.year,
        };
        let candidates = self.source.search(&query, cancel).await?;
        let target = season.episode(episode_number);
        let Some(chosen) = select_candidate(&candidates, target, season) else {
            return Ok(None);
        };

        // Read through the shared cache; a hit skips the download entirely
        let cached = match self.cache.lookup(&chosen.file_id).await? {
            Some(entry) => entry,
            None => {
                let document = self.source.download(&chosen.file_id, cancel).await?;
                self.cache.store(&chosen.file_id, &document).await?
            }
        };

        let raw_bytes = tokio::fs::read(&cached.path).await?;
        let cleaned = self.normalizer.clean_srt(&raw_bytes)?;
        let text = self.normalizer.plain_text_from_srt(&cleaned)?;
        let raw_vector = Fingerprint::from_text(&text);

        Ok(Some(ReferenceFingerprint {
            episode_number,
            title: target.map(|e| e.title.clone()).unwrap_or_default(),
            vector: raw_vector.clone(),
            raw_vector,
            file_id: chosen.file_id.clone(),
            language: cached.language,
            cache_path: cached.path,
        }))
    }
}

/// Pick the best subtitle candidate for a target episode.
///
/// Rules, in order: exclude candidates whose release name mentions another
/// season episode's title without mentioning the target's; prefer
/// non-hearing-impaired among the remainder; when the exclusion empties the
/// set, reapply only the hearing-impaired preference to the full list. The
/// incoming download-count order is preserved within each tier.
#[must_use]
pub fn select_candidate<'a>(
    candidates: &'a [SubtitleCandidate],
    target: Option<&EpisodeInfo>,
    season: &SeasonInfo,
) -> Option<&'a SubtitleCandidate> {
    if candidates.is_empty() {
        return None;
    }

    let filtered: Vec<&SubtitleCandidate> = candidates
        .iter()
        .filter(|candidate| !mentions_wrong_episode(candidate, target, season))
        .collect();

    let pool: Vec<&SubtitleCandidate> = if filtered.is_empty() {
        candidates.iter().collect()
    } else {
        filtered
    };

    pool.iter()
        .find(|c| !c.hearing_impaired)
        .or_else(|| pool.first())
        .copied()
}

fn mentions_wrong_episode(
    candidate: &SubtitleCandidate,
    target: Option<&EpisodeInfo>,
    season: &SeasonInfo,
) -> bool {
    let release = candidate.release_name.to_lowercase();
    let target_number = target.map(|e| e.number);

    let mentions_target = target
        .map(|e| title_matches(&release, &e.title))
        .unwrap_or(false);
    if mentions_target {
        return false;
    }

    season
        .episodes
        .iter()
        .filter(|other| Some(other.number) != target_number)
        .any(|other| title_matches(&release, &other.title))
}

fn title_matches(release_lower: &str, title: &str) -> bool {
    let title = title.trim().to_lowercase();
    title.chars().count() >= MIN_TITLE_MATCH_LEN && release_lower.contains(&title)
}
