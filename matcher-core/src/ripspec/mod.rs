//! # Rip-Spec Envelope
//!
//! The typed view of a disc's rip specification: its episodes, playlist
//! titles, ripped assets, open-ended attribute bag, and show metadata.
//! Attributes the matcher reads or writes are named fields; everything else
//! round-trips untouched through the flattened `extra` map.


use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::MatchResult;

/// One episode slot of the rip spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RipSpecEpisode {
    /// Stable episode key such as `"s01e02"`
    pub key: String,
    /// Disc playlist identifier
    pub title_id: u32,
    /// Resolved season number, 0 when unresolved
    #[serde(default)]
    pub season: u32,
    /// Resolved episode number, 0 when unresolved
    #[serde(default)]
    pub episode: u32,
    /// Episode title once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
    /// Episode air date once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_air_date: Option<NaiveDate>,
    /// Output file stem hint once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_basename: Option<String>,
    /// Match score once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f64>,
}

/// One disc playlist title
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    /// Disc playlist identifier
    pub title_id: u32,
    /// Playlist name as read from the disc
    #[serde(default)]
    pub name: String,
    /// Season number once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    /// Episode number once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Episode title once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
    /// Episode air date once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_air_date: Option<NaiveDate>,
}

/// File assets attached to the rip spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RipAssets {
    /// Episode key to ripped file path
    #[serde(default)]
    pub ripped: BTreeMap<String, PathBuf>,
}

/// Show-level metadata carried with the spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowMetadata {
    /// Show title as known to the metadata provider
    #[serde(default)]
    pub show_title: String,
    /// Season the disc belongs to
    #[serde(default)]
    pub season_number: u32,
    /// TMDB id of the show
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u64>,
    /// First-air year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Expected audio language (lowercase ISO 639-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One structured match record written into the attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentIdMatch {
    /// Rip episode key
    pub episode_key: String,
    /// Disc playlist identifier
    pub title_id: u32,
    /// Assigned canonical episode number
    pub matched_episode: u32,
    /// Match score
    pub score: f64,
    /// Reference subtitle identifier, when one backed the match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Reference subtitle language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Local cache path of the reference subtitle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl From<&MatchResult> for ContentIdMatch {
    fn from(result: &MatchResult) -> Self {
        Self {
            episode_key: result.episode_key.clone(),
            title_id: result.title_id,
            matched_episode: result.target_episode,
            score: result.score,
            file_id: result.file_id.clone(),
            language: result.language.clone(),
            cache_path: result.cache_path.clone(),
        }
    }
}

/// Open-ended attribute bag with named fields for what the matcher touches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscAttributes {
    /// Position of the disc within the season's release, 1-based
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u32>,
    /// Whether a heuristic asked for human review
    #[serde(default)]
    pub needs_review: bool,
    /// Accumulated review reasons, `"; "`-joined
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub review_reason: String,
    /// Structured match records
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_id_matches: Vec<ContentIdMatch>,
    /// Identification method tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id_method: Option<String>,
    /// Lower-cased episode key to transcript path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content_id_transcripts: BTreeMap<String, PathBuf>,
    /// Winning strategy tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id_selected_strategy: Option<String>,
    /// Strategy tag to mean match score
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content_id_strategy_scores: BTreeMap<String, f64>,
    /// Whether episode numbering has been synchronized
    #[serde(default)]
    pub episodes_synchronized: bool,
    /// Unknown attribute keys, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DiscAttributes {
    /// Append a review reason and raise the review flag
    pub fn flag_review(&mut self, reason: &str) {
        self.needs_review = true;
        if self.review_reason.is_empty() {
            self.review_reason = reason.to_string();
        } else {
            self.review_reason = format!("{}; {}", self.review_reason, reason);
        }
    }
}

/// A disc's rip specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RipSpec {
    /// Episode slots in disc order
    #[serde(default)]
    pub episodes: Vec<RipSpecEpisode>,
    /// Disc playlist titles
    #[serde(default)]
    pub titles: Vec<TitleRecord>,
    /// File assets
    #[serde(default)]
    pub assets: RipAssets,
    /// Attribute bag
    #[serde(default)]
    pub attributes: DiscAttributes,
    /// Show metadata
    #[serde(default)]
    pub metadata: ShowMetadata,
}

impl RipSpec {
    /// Episode slots that have a ripped file, in disc order
    #[must_use]
    pub fn ripped_episodes(&self) -> Vec<(&RipSpecEpisode, &PathBuf)> {
        self.episodes
            .iter()
            .filter_map(|e| self.assets.ripped.get(&e.key).map(|p| (e, p)))
            .collect()
    }

    /// Find an episode slot by key
    pub fn episode_mut(&mut self, key: &str) -> Option<&mut RipSpecEpisode> {
        self.episodes.iter_mut().find(|e| e.key == key)
    }

    /// Find a title record by id
    pub fn title_mut(&mut self, title_id: u32) -> Option<&mut TitleRecord> {
        self.titles.iter_mut().find(|t| t.title_id == title_id)
    }
}
