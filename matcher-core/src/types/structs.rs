use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fingerprint::{Fingerprint, IdfTable};
use crate::types::enums::StrategyKind;

/// Fingerprint carrier for one ripped episode file.
///
/// `raw_vector` keeps the pre-IDF term frequencies so the strategy evaluator
/// can re-weight the rip against different reference subsets without
/// re-tokenizing the transcript.
#[derive(Debug, Clone)]
pub struct RipFingerprint {
    /// Stable identifier such as `"s01e02"`
    pub episode_key: String,
    /// Disc playlist identifier
    pub title_id: u32,
    /// Path to the generated transcript
    pub subtitle_path: PathBuf,
    /// Active fingerprint under the current IDF table
    pub vector: Fingerprint,
    /// Pre-IDF term-frequency fingerprint
    pub raw_vector: Fingerprint,
}

impl RipFingerprint {
    /// Build a carrier from transcript text; the active vector starts raw
    #[must_use]
    pub fn new(episode_key: String, title_id: u32, subtitle_path: PathBuf, text: &str) -> Self {
        let raw = Fingerprint::from_text(text);
        Self {
            episode_key,
            title_id,
            subtitle_path,
            vector: raw.clone(),
            raw_vector: raw,
        }
    }

    /// Install the IDF-weighted vector, always deriving from the raw vector
    pub fn apply_idf(&mut self, idf: &IdfTable) {
        self.vector = self.raw_vector.reweight(idf);
    }

    /// Restore the raw vector as the active one
    pub fn clear_idf(&mut self) {
        self.vector = self.raw_vector.clone();
    }
}

/// Fingerprint carrier for one reference episode subtitle
#[derive(Debug, Clone)]
pub struct ReferenceFingerprint {
    /// Episode number within the season (1-based)
    pub episode_number: u32,
    /// Episode title, may be empty
    pub title: String,
    /// Active fingerprint under the current IDF table
    pub vector: Fingerprint,
    /// Pre-IDF term-frequency fingerprint
    pub raw_vector: Fingerprint,
    /// Opaque identifier from the reference source
    pub file_id: String,
    /// Subtitle language
    pub language: String,
    /// Local cache path of the subtitle document
    pub cache_path: PathBuf,
}

impl ReferenceFingerprint {
    /// Install the IDF-weighted vector, always deriving from the raw vector
    pub fn apply_idf(&mut self, idf: &IdfTable) {
        self.vector = self.raw_vector.reweight(idf);
    }

    /// Restore the raw vector as the active one
    pub fn clear_idf(&mut self) {
        self.vector = self.raw_vector.clone();
    }
}

/// One rip-to-episode assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Rip episode key
    pub episode_key: String,
    /// Disc playlist identifier of the rip
    pub title_id: u32,
    /// Assigned canonical episode number
    pub target_episode: u32,
    /// Similarity (or LLM confidence) in `[0, 1]`
    pub score: f64,
    /// Reference subtitle identifier, absent for positional gap fills
    pub file_id: Option<String>,
    /// Reference subtitle language
    pub language: Option<String>,
    /// Local cache path of the reference subtitle
    pub cache_path: Option<PathBuf>,
}

impl MatchResult {
    /// Copy the reference-side identifiers from a fetched reference
    pub fn attach_reference(&mut self, reference: &ReferenceFingerprint) {
        self.file_id = Some(reference.file_id.clone());
        self.language = Some(reference.language.clone());
        self.cache_path = Some(reference.cache_path.clone());
    }
}

/// Record of one block-refinement pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRefinement {
    /// First episode of the enforced block
    pub block_start: u32,
    /// Last episode of the enforced block
    pub block_end: u32,
    /// Matches that fell outside the block
    pub displaced: usize,
    /// Block episodes not claimed by any valid match
    pub gaps: usize,
    /// Displaced matches moved into gaps
    pub reassigned: usize,
    /// Whether a heuristic flagged the result
    pub needs_review: bool,
    /// Reason behind `needs_review`, empty otherwise
    pub review_reason: String,
}

/// Per-strategy telemetry emitted with the final outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyScore {
    /// Which strategy produced the numbers
    pub strategy: StrategyKind,
    /// Accepted match count
    pub matches: usize,
    /// Arithmetic mean of match scores, 0 when no matches
    pub average_score: f64,
    /// Whether refinement flagged the outcome
    pub needs_review: bool,
}

/// Final result of one matcher invocation
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Whether the rip spec was mutated with assignments
    pub applied: bool,
    /// Final per-file assignments
    pub matches: Vec<MatchResult>,
    /// Winning strategy, `None` when nothing applied
    pub selected_strategy: Option<StrategyKind>,
    /// Telemetry for every evaluated strategy
    pub strategy_scores: Vec<StrategyScore>,
    /// Whether any heuristic asked for human review
    pub needs_review: bool,
    /// Accumulated review reasons, joined with `"; "` on the rip spec
    pub review_reasons: Vec<String>,
}

impl MatchOutcome {
    /// Append a review reason and raise the review flag
    pub fn flag_review(&mut self, reason: impl Into<String>) {
        self.needs_review = true;
        self.review_reasons.push(reason.into());
    }
}
