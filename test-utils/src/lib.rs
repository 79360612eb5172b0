//! # Test Utilities
//!
//! Shared test fakes for the matching engine.
//!
//! Provides:
//! - In-memory implementations of every external collaborator
//! - Deterministic transcript fixtures with controllable vocabulary overlap
//! - A season builder

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use ripmatch_core::external::{
    CachedSubtitle, EpisodeInfo, LlmClient, ReferenceCache, ReferenceSource, SeasonCatalog,
    SeasonInfo, SubtitleCandidate, SubtitleDocument, SubtitleNormalizer, TranscribeRequest,
    Transcriber,
};
use ripmatch_core::{Error, Result};

// ============================================================================
// Fixtures
// ============================================================================

/// Build a season with numbered episodes titled "Episode N"
pub fn season_fixture(episode_count: u32) -> SeasonInfo {
    SeasonInfo {
        season_number: 1,
        episodes: (1..=episode_count)
            .map(|number| EpisodeInfo {
                number,
                title: format!("Episode {number}"),
                air_date: None,
            })
            .collect(),
    }
}

/// Deterministic reference transcript for one episode: thirty distinct
/// tokens plus a few words shared across the whole season
pub fn episode_script(episode: u32) -> String {
    let mut words: Vec<String> = (0..30).map(|i| format!("ep{episode}line{i}")).collect();
    words.push("station".to_string());
    words.push("common".to_string());
    words.join(" ")
}

/// Rip transcript overlapping `30 - noise` tokens with [`episode_script`].
///
/// Against the matching reference the raw cosine is roughly
/// `(30 - noise) / 30`; against other episodes it is near zero.
pub fn rip_script(episode: u32, noise: usize) -> String {
    let mut words: Vec<String> = (0..30)
        .map(|i| {
            if i < 30 - noise {
                format!("ep{episode}line{i}")
            } else {
                format!("noise{episode}tok{i}")
            }
        })
        .collect();
    words.push("station".to_string());
    words.push("common".to_string());
    words.join(" ")
}

// ============================================================================
// Transcriber
// ============================================================================

/// Transcriber that writes scripted text keyed by episode key
#[derive(Default)]
pub struct FakeTranscriber {
    scripts: HashMap<String, String>,
}

impl FakeTranscriber {
    /// Create an empty transcriber
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transcript text for one episode key
    #[must_use]
    pub fn with_script(mut self, episode_key: &str, text: &str) -> Self {
        self.scripts.insert(episode_key.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        request: &TranscribeRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let text = self
            .scripts
            .get(&request.output_basename)
            .ok_or_else(|| {
                Error::Transcription(format!("no script for {}", request.output_basename))
            })?;
        let path = request.work_dir.join(format!("{}.srt", request.output_basename));
        std::fs::write(&path, text)?;
        Ok(path)
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Normalizer that treats subtitle payloads as plain text
pub struct PlainNormalizer;

impl SubtitleNormalizer for PlainNormalizer {
    fn clean_srt(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn plain_text_from_srt(&self, raw: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn extract_time_range(
        &self,
        srt_path: &Path,
        _start_seconds: f64,
        _end_seconds: f64,
    ) -> Result<String> {
        Ok(std::fs::read_to_string(srt_path)?)
    }

    fn middle_range(&self, _srt_path: &Path, half_window_seconds: f64) -> Result<(f64, f64)> {
        Ok((0.0, half_window_seconds * 2.0))
    }
}

// ============================================================================
// Season catalog
// ============================================================================

/// Catalog serving one fixed season
pub struct StaticSeasonCatalog {
    season: SeasonInfo,
}

impl StaticSeasonCatalog {
    /// Serve the given season for any lookup
    #[must_use]
    pub fn new(season: SeasonInfo) -> Self {
        Self { season }
    }
}

#[async_trait]
impl SeasonCatalog for StaticSeasonCatalog {
    async fn season(
        &self,
        _tmdb_id: u64,
        _season_number: u32,
        cancel: &CancellationToken,
    ) -> Result<SeasonInfo> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.season.clone())
    }
}

/// Catalog that always fails, for error-path tests
pub struct FailingSeasonCatalog;

#[async_trait]
impl SeasonCatalog for FailingSeasonCatalog {
    async fn season(
        &self,
        _tmdb_id: u64,
        _season_number: u32,
        _cancel: &CancellationToken,
    ) -> Result<SeasonInfo> {
        Err(Error::Catalog("catalog unavailable".to_string()))
    }
}

// ============================================================================
// Reference source and cache
// ============================================================================

/// In-memory subtitle source with per-episode candidates and documents
#[derive(Default)]
pub struct StaticReferenceSource {
    candidates: HashMap<u32, Vec<SubtitleCandidate>>,
    documents: HashMap<String, SubtitleDocument>,
    search_calls: Mutex<Vec<u32>>,
}

impl StaticReferenceSource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single plain candidate plus document for an episode
    #[must_use]
    pub fn with_episode_text(mut self, episode: u32, text: &str) -> Self {
        let file_id = format!("ref-{episode}");
        self.candidates.insert(
            episode,
            vec![SubtitleCandidate {
                file_id: file_id.clone(),
                language: "en".to_string(),
                release_name: format!("Show.S01E{episode:02}.WEB"),
                downloads: 1000,
                hearing_impaired: false,
            }],
        );
        self.documents.insert(
            file_id.clone(),
            SubtitleDocument {
                bytes: text.as_bytes().to_vec(),
                language: "en".to_string(),
                file_name: format!("{file_id}.srt"),
            },
        );
        self
    }

    /// Register explicit candidates and their documents for an episode
    #[must_use]
    pub fn with_candidates(
        mut self,
        episode: u32,
        candidates: Vec<SubtitleCandidate>,
        documents: Vec<(String, String)>,
    ) -> Self {
        self.candidates.insert(episode, candidates);
        for (file_id, text) in documents {
            self.documents.insert(
                file_id.clone(),
                SubtitleDocument {
                    bytes: text.into_bytes(),
                    language: "en".to_string(),
                    file_name: format!("{file_id}.srt"),
                },
            );
        }
        self
    }

    /// Episodes searched so far, in call order
    #[must_use]
    pub fn searched_episodes(&self) -> Vec<u32> {
        self.search_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReferenceSource for StaticReferenceSource {
    async fn search(
        &self,
        query: &ripmatch_core::external::SubtitleQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubtitleCandidate>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.search_calls.lock().unwrap().push(query.episode);
        Ok(self.candidates.get(&query.episode).cloned().unwrap_or_default())
    }

    async fn download(
        &self,
        file_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SubtitleDocument> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.documents
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::Reference(format!("unknown file id {file_id}")))
    }
}

/// File-backed cache under a temporary directory
pub struct MemoryReferenceCache {
    dir: tempfile::TempDir,
    entries: Mutex<HashMap<String, CachedSubtitle>>,
}

impl MemoryReferenceCache {
    /// Create a cache rooted in a fresh temporary directory
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryReferenceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferenceCache for MemoryReferenceCache {
    async fn lookup(&self, file_id: &str) -> Result<Option<CachedSubtitle>> {
        Ok(self.entries.lock().unwrap().get(file_id).cloned())
    }

    async fn store(&self, file_id: &str, document: &SubtitleDocument) -> Result<CachedSubtitle> {
        let path = self.dir.path().join(format!("{file_id}.srt"));
        std::fs::write(&path, &document.bytes)?;
        let entry = CachedSubtitle {
            path,
            language: document.language.clone(),
            file_name: document.file_name.clone(),
        };
        self.entries
            .lock()
            .unwrap()
            .insert(file_id.to_string(), entry.clone());
        Ok(entry)
    }
}

// ============================================================================
// LLM clients
// ============================================================================

/// LLM fake that pops scripted raw responses in call order
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    /// Create with a list of raw responses, consumed first to last
    #[must_use]
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// User prompts seen so far
    #[must_use]
    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete_json(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Llm("no scripted response left".to_string()))
    }
}

/// LLM fake answering by `(episode_key, candidate_episode)` pairs.
///
/// Robust against call-order changes: the pair is read from the first line
/// of the verification prompt. Unknown pairs reject with zero confidence.
pub struct VerdictLlm {
    verdicts: HashMap<(String, u32), (bool, f64)>,
}

impl VerdictLlm {
    /// Create an empty verdict table
    #[must_use]
    pub fn new() -> Self {
        Self {
            verdicts: HashMap::new(),
        }
    }

    /// Accept or reject one `(episode_key, candidate_episode)` pair
    #[must_use]
    pub fn with_verdict(
        mut self,
        episode_key: &str,
        candidate_episode: u32,
        same_episode: bool,
        confidence: f64,
    ) -> Self {
        self.verdicts
            .insert((episode_key.to_string(), candidate_episode), (same_episode, confidence));
        self
    }
}

impl Default for VerdictLlm {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse "Rip KEY is tentatively matched to episode N." from the prompt head
fn parse_pair(user_prompt: &str) -> Option<(String, u32)> {
    let first_line = user_prompt.lines().next()?;
    let rest = first_line.strip_prefix("Rip ")?;
    let (key, rest) = rest.split_once(" is tentatively matched to episode ")?;
    let episode: u32 = rest.trim_end_matches('.').trim().parse().ok()?;
    Some((key.to_string(), episode))
}

#[async_trait]
impl LlmClient for VerdictLlm {
    async fn complete_json(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let (same_episode, confidence) = parse_pair(user_prompt)
            .and_then(|pair| self.verdicts.get(&pair).copied())
            .unwrap_or((false, 0.0));
        Ok(format!(
            "{{\"same_episode\": {same_episode}, \"confidence\": {confidence}, \"explanation\": \"scripted\"}}"
        ))
    }
}

/// LLM fake that always fails at transport level
pub struct UnreachableLlm;

#[async_trait]
impl LlmClient for UnreachableLlm {
    async fn complete_json(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        Err(Error::Llm("connection refused".to_string()))
    }
}
