//! # External Collaborators
//!
//! Trait contracts for everything the matching engine does not own:
//! speech-to-text transcription, reference-subtitle search/download and
//! caching, season catalog lookup, SRT normalization, and LLM completion.
//!
//! Implementations are injected at construction time; tests substitute the
//! in-memory fakes from `test-utils`. Rate limiting, retries, and backoff
//! belong behind these traits, never in the core.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Everything a transcriber needs for one ripped episode file
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    /// Ripped media file to transcribe
    pub source_path: PathBuf,
    /// Directory for intermediate and output files
    pub work_dir: PathBuf,
    /// Output file stem; the transcript lands at `{output_basename}.srt`
    pub output_basename: String,
    /// Expected audio language (lowercase ISO 639-1)
    pub language: String,
    /// Show title, for engines that take a biasing hint
    pub show_title: String,
    /// Season number of the disc being matched
    pub season_number: u32,
}

/// Speech-to-text transcription of ripped media
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Produce an SRT transcript for one ripped file.
    ///
    /// May be long-running; must return promptly once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine fails; the matcher surfaces it
    /// verbatim without mutating the rip spec.
    async fn transcribe(
        &self,
        request: &TranscribeRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

/// Search parameters for reference subtitles of one episode
#[derive(Debug, Clone)]
pub struct SubtitleQuery {
    /// Show title as known to the metadata provider
    pub show_title: String,
    /// TMDB id of the show
    pub parent_id: u64,
    /// Season number
    pub season: u32,
    /// Episode number
    pub episode: u32,
    /// Acceptable subtitle languages, preference order
    pub languages: Vec<String>,
    /// First-air year, when known
    pub year: Option<u32>,
}

/// One subtitle offered by the reference source, in download-count order
#[derive(Debug, Clone)]
pub struct SubtitleCandidate {
    /// Opaque identifier for downloading
    pub file_id: String,
    /// Subtitle language
    pub language: String,
    /// Release name as published
    pub release_name: String,
    /// Download count reported by the source
    pub downloads: u64,
    /// Whether the subtitle is marked hearing-impaired
    pub hearing_impaired: bool,
}

/// Raw subtitle bytes with their source metadata
#[derive(Debug, Clone)]
pub struct SubtitleDocument {
    /// Raw SRT payload
    pub bytes: Vec<u8>,
    /// Subtitle language
    pub language: String,
    /// File name as published
    pub file_name: String,
}

/// Searchable source of reference subtitles
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Search subtitle candidates for one episode.
    ///
    /// Results come back download-count descending.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure after the implementation's own
    /// retry budget is spent.
    async fn search(
        &self,
        query: &SubtitleQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubtitleCandidate>>;

    /// Download one subtitle by its `file_id`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    async fn download(
        &self,
        file_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SubtitleDocument>;
}

/// A cached subtitle document on local disk
#[derive(Debug, Clone)]
pub struct CachedSubtitle {
    /// Local path of the cached payload
    pub path: PathBuf,
    /// Subtitle language
    pub language: String,
    /// Original file name
    pub file_name: String,
}

/// Shared read-write cache of downloaded reference subtitles, keyed by
/// `file_id`
#[async_trait]
pub trait ReferenceCache: Send + Sync {
    /// Look up a previously stored subtitle.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache backend fails.
    async fn lookup(&self, file_id: &str) -> Result<Option<CachedSubtitle>>;

    /// Store a downloaded subtitle and return its cache entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache backend fails.
    async fn store(&self, file_id: &str, document: &SubtitleDocument) -> Result<CachedSubtitle>;
}

/// One episode of a season as known to the catalog
#[derive(Debug, Clone)]
pub struct EpisodeInfo {
    /// Episode number within the season (1-based)
    pub number: u32,
    /// Episode title, may be empty
    pub title: String,
    /// First air date, when known
    pub air_date: Option<NaiveDate>,
}

/// A season's episode list
#[derive(Debug, Clone, Default)]
pub struct SeasonInfo {
    /// Season number
    pub season_number: u32,
    /// Episodes in broadcast order
    pub episodes: Vec<EpisodeInfo>,
}

impl SeasonInfo {
    /// Number of episodes in the season
    #[must_use]
    pub fn episode_count(&self) -> u32 {
        self.episodes.len() as u32
    }

    /// Find an episode by its number
    #[must_use]
    pub fn episode(&self, number: u32) -> Option<&EpisodeInfo> {
        self.episodes.iter().find(|e| e.number == number)
    }
}

/// Season-episode list retrieval
#[async_trait]
pub trait SeasonCatalog: Send + Sync {
    /// Fetch the episode list for one season of a show.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog is unreachable or the season is
    /// unknown.
    async fn season(
        &self,
        tmdb_id: u64,
        season_number: u32,
        cancel: &CancellationToken,
    ) -> Result<SeasonInfo>;
}

/// Subtitle text extraction and windowing.
///
/// Synchronous on purpose: normalization is local CPU/file work and not one
/// of the matcher's suspension points.
pub trait SubtitleNormalizer: Send + Sync {
    /// Strip formatting artifacts from a raw SRT payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not decodable subtitle data.
    fn clean_srt(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// Extract the plain dialogue text from a raw SRT payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not decodable subtitle data.
    fn plain_text_from_srt(&self, raw: &[u8]) -> Result<String>;

    /// Extract the dialogue text between two timestamps of an SRT file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    fn extract_time_range(
        &self,
        srt_path: &Path,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<String>;

    /// Compute the `(start, end)` seconds of a window of `2 ×
    /// half_window_seconds` centered on the middle of an SRT file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    fn middle_range(&self, srt_path: &Path, half_window_seconds: f64) -> Result<(f64, f64)>;
}

/// JSON-mode completion against a configured language model
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the raw response text.
    ///
    /// The core decodes the response strictly; any decode or transport
    /// error downgrades to a skipped verification.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;
}
