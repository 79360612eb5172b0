//! # LLM Verification
//!
//! Cross-checks low-confidence cosine matches by showing a language model
//! the middle transcript windows of the rip and the reference. A single
//! rejection flags the result for review; two or more trigger a full
//! cross-match over the rejected pairs.
//!
//! Every external failure here is recoverable: a transport or decode error
//! downgrades to a skipped verification and the cosine-derived state stands.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::assignment::assign_matrix;
use crate::error::{Error, Result};
use crate::external::{LlmClient, SubtitleNormalizer};
use crate::types::{MatchPolicy, MatchResult, MatchState, ReferenceFingerprint, RipFingerprint};

/// Half-width of the transcript window in seconds (10 minutes total)
const WINDOW_HALF_SECONDS: f64 = 300.0;
/// Per-side character cap on the prompt text
const MAX_PROMPT_CHARS: usize = 6_000;

/// Fixed system prompt for episode verification
const VERIFY_SYSTEM_PROMPT: &str = "You compare two TV episode transcripts and decide whether \
they represent the same episode. The first transcript was produced by speech recognition and \
may contain mishearings, dropped words, and timing noise. The second is a fan-made or official \
subtitle and may differ in phrasing or be translated. Judge by plot events, character names, \
and distinctive dialogue, not by exact wording. Reply with JSON of the exact form \
{\"same_episode\": bool, \"confidence\": number, \"explanation\": string} and nothing else. \
Confidence is between 0 and 1.";

/// Strict JSON verdict expected from the model
#[derive(Debug, Deserialize)]
struct Verdict {
    same_episode: bool,
    confidence: f64,
    #[allow(dead_code)]
    explanation: String,
}

/// Result of one verification pass
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    /// Matches after any cross-match reassignment
    pub matches: Vec<MatchResult>,
    /// Final state per episode key
    pub states: HashMap<String, MatchState>,
    /// Number of matches the model rejected
    pub rejections: usize,
    /// Whether the pass asked for human review
    pub needs_review: bool,
    /// Review reasons contributed by the pass
    pub review_reasons: Vec<String>,
}

/// Verifies low-confidence matches against a configured language model
pub struct LlmVerifier {
    client: Arc<dyn LlmClient>,
    normalizer: Arc<dyn SubtitleNormalizer>,
    policy: MatchPolicy,
}

impl LlmVerifier {
    /// Create a verifier over the injected client and normalizer
    #[must_use]
    pub fn new(
        client: Arc<dyn LlmClient>,
        normalizer: Arc<dyn SubtitleNormalizer>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            client,
            normalizer,
            policy,
        }
    }

    /// Whether any match sits under the verification threshold
    #[must_use]
    pub fn wants_verification(&self, matches: &[MatchResult]) -> bool {
        matches
            .iter()
            .any(|m| m.score < self.policy.llm_verify_threshold)
    }

    /// Verify the match set, escalating to a cross-match on two or more
    /// rejections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the token fires; every other
    /// external failure is tolerated in place.
    #[instrument(skip_all, fields(matches = matches.len()))]
    pub async fn verify(
        &self,
        matches: Vec<MatchResult>,
        rips: &[RipFingerprint],
        refs: &[ReferenceFingerprint],
        cancel: &CancellationToken,
    ) -> Result<VerificationReport> {
        let mut report = VerificationReport {
            states: matches
                .iter()
                .map(|m| {
                    let state = if m.score >= self.policy.llm_verify_threshold {
                        MatchState::Confirmed
                    } else {
                        MatchState::Challenged
                    };
                    (m.episode_key.clone(), state)
                })
                .collect(),
            ..VerificationReport::default()
        };

        let rip_by_key: HashMap<&str, &RipFingerprint> =
            rips.iter().map(|r| (r.episode_key.as_str(), r)).collect();

        for m in &matches {
            if report.states[&m.episode_key] != MatchState::Challenged {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(rip) = rip_by_key.get(m.episode_key.as_str()) else {
                continue;
            };
            let Some(cache_path) = m.cache_path.as_deref() else {
                debug!(key = %m.episode_key, "no reference transcript, verification skipped");
                continue;
            };
            match self
                .judge_pair(&rip.subtitle_path, cache_path, &m.episode_key, m.target_episode, cancel)
                .await
            {
                Some(verdict) if verdict.same_episode => {
                    report
                        .states
                        .insert(m.episode_key.clone(), MatchState::Confirmed);
                }
                Some(_) => {
                    report
                        .states
                        .insert(m.episode_key.clone(), MatchState::Rejected);
                    report.rejections += 1;
                }
                None => {} // skipped; cosine-derived state stands
            }
        }

        match report.rejections {
            0 => {
                report.matches = matches;
            }
            1 => {
                let rejected_key = rejected_keys(&report).remove(0);
                report.needs_review = true;
                report
                    .review_reasons
                    .push(format!("llm_rejected: {rejected_key}"));
                report.matches = matches;
            }
            _ => {
                self.cross_match(matches, rips, refs, &mut report, cancel)
                    .await?;
            }
        }
        Ok(report)
    }

    /// Re-pair every rejected rip with every rejected reference and solve
    /// the optimal assignment over the accepted confidences.
    async fn cross_match(
        &self,
        matches: Vec<MatchResult>,
        rips: &[RipFingerprint],
        refs: &[ReferenceFingerprint],
        report: &mut VerificationReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let rejected: Vec<&MatchResult> = matches
            .iter()
            .filter(|m| report.states[&m.episode_key] == MatchState::Rejected)
            .collect();
        let rip_by_key: HashMap<&str, &RipFingerprint> =
            rips.iter().map(|r| (r.episode_key.as_str(), r)).collect();
        let ref_by_episode: HashMap<u32, &ReferenceFingerprint> =
            refs.iter().map(|r| (r.episode_number, r)).collect();

        let rejected_refs: Vec<&ReferenceFingerprint> = rejected
            .iter()
            .filter_map(|m| ref_by_episode.get(&m.target_episode).copied())
            .collect();

        let mut confidences = vec![vec![0.0_f64; rejected_refs.len()]; rejected.len()];
        for (i, m) in rejected.iter().enumerate() {
            let Some(rip) = rip_by_key.get(m.episode_key.as_str()) else {
                continue;
            };
            for (j, reference) in rejected_refs.iter().enumerate() {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if let Some(verdict) = self
                    .judge_pair(
                        &rip.subtitle_path,
                        &reference.cache_path,
                        &m.episode_key,
                        reference.episode_number,
                        cancel,
                    )
                    .await
                {
                    if verdict.same_episode {
                        confidences[i][j] = verdict.confidence.clamp(0.0, 1.0);
                    }
                }
            }
        }

        let pairs = assign_matrix(&confidences, rejected.len(), rejected_refs.len(), 0.0)?;
        if pairs.is_empty() {
            debug!("cross-match accepted nothing, original matches kept");
            report.needs_review = true;
            report
                .review_reasons
                .push("llm_rejected: no cross-match combination accepted".to_string());
            report.matches = matches;
            return Ok(());
        }

        let mut rematched: HashMap<String, (u32, f64, &ReferenceFingerprint)> = HashMap::new();
        for pair in &pairs {
            let key = rejected[pair.rip_index].episode_key.clone();
            let reference = rejected_refs[pair.ref_index];
            rematched.insert(key, (reference.episode_number, pair.score, reference));
        }

        let mut updated = matches;
        for m in &mut updated {
            if let Some((episode, confidence, reference)) = rematched.get(&m.episode_key) {
                m.target_episode = *episode;
                m.score = *confidence;
                m.attach_reference(reference);
                report
                    .states
                    .insert(m.episode_key.clone(), MatchState::Rematched);
            }
        }

        let unmatched: Vec<String> = rejected_keys(report);
        if !unmatched.is_empty() {
            report.needs_review = true;
            report.review_reasons.push(format!(
                "llm_rejected: no accepted reassignment for {}",
                unmatched.join(", ")
            ));
        }
        report.matches = updated;
        Ok(())
    }

    /// Run one verdict; `None` means the verification was skipped
    async fn judge_pair(
        &self,
        rip_path: &Path,
        reference_path: &Path,
        episode_key: &str,
        candidate_episode: u32,
        cancel: &CancellationToken,
    ) -> Option<Verdict> {
        let rip_text = match self.middle_window(rip_path) {
            Ok(text) => text,
            Err(err) => {
                warn!(key = episode_key, error = %err, "rip transcript window failed, verification skipped");
                return None;
            }
        };
        let reference_text = match self.middle_window(reference_path) {
            Ok(text) => text,
            Err(err) => {
                warn!(key = episode_key, error = %err, "reference window failed, verification skipped");
                return None;
            }
        };

        let user_prompt = format!(
            "Rip {episode_key} is tentatively matched to episode {candidate_episode}.\n\n\
             === Rip transcript (speech recognition) ===\n{rip_text}\n\n\
             === Reference subtitle for episode {candidate_episode} ===\n{reference_text}"
        );

        let raw = match self
            .client
            .complete_json(VERIFY_SYSTEM_PROMPT, &user_prompt, cancel)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = episode_key, error = %err, "LLM call failed, verification skipped");
                return None;
            }
        };

        match serde_json::from_str::<Verdict>(&raw) {
            Ok(verdict) => {
                debug!(
                    key = episode_key,
                    episode = candidate_episode,
                    same = verdict.same_episode,
                    confidence = verdict.confidence,
                    "LLM verdict"
                );
                Some(verdict)
            }
            Err(err) => {
                warn!(key = episode_key, error = %err, "LLM verdict not decodable, verification skipped");
                None
            }
        }
    }

    /// Middle ten-minute transcript window, capped per side
    pub fn middle_window(&self, path: &Path) -> Result<String> {
        let (start, end) = self.normalizer.middle_range(path, WINDOW_HALF_SECONDS)?;
        let text = self.normalizer.extract_time_range(path, start, end)?;
        Ok(truncate_chars(&text, MAX_PROMPT_CHARS))
    }
}

fn rejected_keys(report: &VerificationReport) -> Vec<String> {
    let mut keys: Vec<String> = report
        .states
        .iter()
        .filter(|(_, state)| **state == MatchState::Rejected)
        .map(|(key, _)| key.clone())
        .collect();
    keys.sort();
    keys
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    text.chars().take(limit).collect()
}
