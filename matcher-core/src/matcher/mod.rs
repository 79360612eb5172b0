//! # Episode Matcher
//!
//! Main orchestrator for the matching pipeline:
//! 1. **Transcribe** - speech-to-text for every ripped file
//! 2. **Plan** - derive candidate episodes from the rip spec and disc number
//! 3. **Anchor** - pin the disc window on a high-confidence pair
//! 4. **Evaluate** - run every strategy, pick the best outcome
//! 5. **Verify** - optionally cross-check low-confidence matches with an LLM
//! 6. **Apply** - write assignments and telemetry back onto the rip spec
//!
//! One matcher instance processes one disc per call and keeps no state
//! between calls; concurrent invocations on different discs are safe.

mod apply;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::anchor::select_anchor;
use crate::error::{Error, Result};
use crate::external::{
    LlmClient, ReferenceCache, ReferenceSource, SeasonCatalog, SubtitleNormalizer, TranscribeRequest,
    Transcriber,
};
use crate::planning::plan_candidates;
use crate::progress::{ProgressFn, ProgressPhase, ProgressUpdate};
use crate::references::{FetchContext, ReferenceFetcher};
use crate::ripspec::RipSpec;
use crate::strategy::{build_attempts, evaluate_strategies, select_best};
use crate::types::{MatchOutcome, MatchPolicy, RipFingerprint};
use crate::verification::LlmVerifier;

/// Review tag when no strategy produced matches
const REASON_NO_MATCHES: &str = "contentid_no_matches";
/// Review tag when no reference subtitle could be obtained
const REASON_NO_REFERENCES: &str = "contentid_no_references";

/// Default subtitle language when the rip spec does not carry one
const DEFAULT_LANGUAGE: &str = "en";

/// Transcript-correlation episode matcher.
///
/// Collaborators are injected once; every [`EpisodeMatcher::match_disc`]
/// call is self-contained.
pub struct EpisodeMatcher {
    transcriber: Arc<dyn Transcriber>,
    catalog: Arc<dyn SeasonCatalog>,
    normalizer: Arc<dyn SubtitleNormalizer>,
    fetcher: ReferenceFetcher,
    llm: Option<Arc<dyn LlmClient>>,
    policy: MatchPolicy,
    progress: Option<ProgressFn>,
}

impl EpisodeMatcher {
    /// Create a matcher over the injected collaborators.
    ///
    /// The policy is validated up front; invalid ratio fields fall back to
    /// their defaults.
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        catalog: Arc<dyn SeasonCatalog>,
        source: Arc<dyn ReferenceSource>,
        cache: Arc<dyn ReferenceCache>,
        normalizer: Arc<dyn SubtitleNormalizer>,
        policy: MatchPolicy,
    ) -> Self {
        let fetcher = ReferenceFetcher::new(
            source,
            cache,
            normalizer.clone(),
            vec![DEFAULT_LANGUAGE.to_string()],
        );
        Self {
            transcriber,
            catalog,
            normalizer,
            fetcher,
            llm: None,
            policy: policy.validated(),
            progress: None,
        }
    }

    /// Enable LLM verification of low-confidence matches
    #[must_use]
    pub fn with_llm(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(client);
        self
    }

    /// Install a best-effort progress callback
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Match every ripped episode of one disc against its season.
    ///
    /// On success the rip spec is updated in place and the outcome carries
    /// `applied = true`. Soft failures (no references, nothing over the
    /// threshold) return `applied = false` with review reasons and leave
    /// the spec untouched.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] when the spec is unusable; transcription, catalog,
    /// and reference transport errors propagate so the surrounding stage
    /// can retry. Nothing is written to the spec on any error path.
    #[instrument(skip_all, fields(
        show = %spec.metadata.show_title,
        season = spec.metadata.season_number,
        disc = spec.attributes.disc_number.unwrap_or(0),
    ))]
    pub async fn match_disc(
        &self,
        spec: &mut RipSpec,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<MatchOutcome> {
        let disc_number = spec.attributes.disc_number.unwrap_or(0);
        let tmdb_id = spec
            .metadata
            .tmdb_id
            .ok_or_else(|| Error::Input("rip spec has no TMDB id".to_string()))?;
        if work_dir.as_os_str().is_empty() {
            return Err(Error::Input("no staging directory".to_string()));
        }
        let ripped: Vec<(String, u32, u32, PathBuf)> = spec
            .ripped_episodes()
            .into_iter()
            .map(|(e, p)| (e.key.clone(), e.title_id, e.episode, p.clone()))
            .collect();
        if ripped.is_empty() {
            return Err(Error::Input("no ripped episodes".to_string()));
        }

        let season = self
            .catalog
            .season(tmdb_id, spec.metadata.season_number, cancel)
            .await?;
        let season_len = season.episode_count();

        let (rips, transcripts) = self.transcribe_all(spec, &ripped, work_dir, cancel).await?;

        let hints: Vec<u32> = ripped.iter().map(|(_, _, episode, _)| *episode).collect();
        let plan = plan_candidates(&hints, &season, disc_number, &self.policy);
        debug!(candidates = plan.episodes.len(), sources = ?plan.sources, "candidate plan");

        let ctx = FetchContext {
            show_title: spec.metadata.show_title.clone(),
            tmdb_id,
            season_number: spec.metadata.season_number,
            year: spec.metadata.year,
        };
        let season_episodes: Vec<u32> = season.episodes.iter().map(|e| e.number).collect();
        let season_refs = self
            .fetcher
            .fetch_episodes(&ctx, &season_episodes, &season, cancel, self.progress.as_ref())
            .await?;

        let mut outcome = MatchOutcome::default();
        if season_refs.is_empty() {
            warn!("no reference subtitles available for the season");
            outcome.flag_review(REASON_NO_REFERENCES);
            return Ok(outcome);
        }

        let anchor_result = select_anchor(&rips, &season_refs, season_len, &self.policy);
        let anchor = match &anchor_result {
            Ok(anchor) => Some(anchor),
            Err(reason) => {
                debug!(reason = reason.as_str(), "anchor selection failed");
                None
            }
        };

        let attempts = build_attempts(&plan, anchor, &season);
        let outcomes = evaluate_strategies(
            &attempts,
            &rips,
            &season_refs,
            &self.fetcher,
            &ctx,
            &season,
            disc_number,
            &self.policy,
            cancel,
            self.progress.as_ref(),
        )
        .await?;
        outcome.strategy_scores = outcomes.iter().map(|o| o.score_row()).collect();

        let best = select_best(&outcomes).filter(|o| !o.matches.is_empty());
        let Some(best) = best else {
            if let Err(reason) = anchor_result {
                outcome.flag_review(reason.as_str());
            }
            outcome.flag_review(REASON_NO_MATCHES);
            info!("no strategy cleared the similarity threshold");
            return Ok(outcome);
        };

        outcome.selected_strategy = Some(best.attempt.kind);
        let mut matches = best.matches.clone();
        if best.refinement.needs_review {
            outcome.flag_review(best.refinement.review_reason.clone());
        }

        if let Some(client) = &self.llm {
            let verifier = LlmVerifier::new(
                client.clone(),
                self.normalizer.clone(),
                self.policy.clone(),
            );
            if verifier.wants_verification(&matches) {
                let report = verifier
                    .verify(matches, &rips, &best.references, cancel)
                    .await?;
                matches = report.matches;
                for reason in report.review_reasons {
                    outcome.flag_review(reason);
                }
            }
        }

        let low_confidence: Vec<&str> = matches
            .iter()
            .filter(|m| m.score < self.policy.low_confidence_review_threshold)
            .map(|m| m.episode_key.as_str())
            .collect();
        if !low_confidence.is_empty() {
            outcome.flag_review(format!(
                "low_confidence_match: {}",
                low_confidence.join(", ")
            ));
        }

        apply::apply_matches(
            spec,
            &matches,
            &season,
            &transcripts,
            best.attempt.kind,
            &outcome.strategy_scores,
            &outcome.review_reasons,
            self.progress.as_ref(),
        );

        info!(
            matches = matches.len(),
            strategy = best.attempt.kind.as_str(),
            needs_review = outcome.needs_review,
            "matches applied to rip spec"
        );
        outcome.matches = matches;
        outcome.applied = true;
        Ok(outcome)
    }

    /// Transcribe every ripped file in disc order and build raw fingerprints
    async fn transcribe_all(
        &self,
        spec: &RipSpec,
        ripped: &[(String, u32, u32, PathBuf)],
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(Vec<RipFingerprint>, BTreeMap<String, PathBuf>)> {
        let language = spec
            .metadata
            .language
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let mut rips = Vec::with_capacity(ripped.len());
        let mut transcripts = BTreeMap::new();
        for (index, (key, title_id, _, source_path)) in ripped.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(report) = &self.progress {
                report(ProgressUpdate {
                    phase: ProgressPhase::Transcribe,
                    current: index + 1,
                    total: ripped.len(),
                    episode_key: key.clone(),
                });
            }

            let request = TranscribeRequest {
                source_path: source_path.clone(),
                work_dir: work_dir.to_path_buf(),
                output_basename: key.clone(),
                language: language.clone(),
                show_title: spec.metadata.show_title.clone(),
                season_number: spec.metadata.season_number,
            };
            let subtitle_path = self.transcriber.transcribe(&request, cancel).await?;
            let bytes = tokio::fs::read(&subtitle_path).await?;
            let text = self.normalizer.plain_text_from_srt(&bytes)?;
            if text.trim().is_empty() {
                warn!(key = %key, "transcript produced no usable text");
            }

            rips.push(RipFingerprint::new(
                key.clone(),
                *title_id,
                subtitle_path.clone(),
                &text,
            ));
            transcripts.insert(key.to_lowercase(), subtitle_path);
        }
        Ok((rips, transcripts))
    }
}
