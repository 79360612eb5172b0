#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

//! # Ripmatch Core
//!
//! Maps ripped TV episode files (presented in arbitrary on-disc order) to
//! canonical season/episode numbers by correlating speech-to-text
//! transcripts against reference subtitles for a known season.
//!
//! ## How a disc gets matched
//!
//! 1. Every ripped file is transcribed and reduced to a term-frequency
//!    fingerprint ([`fingerprint`]).
//! 2. A candidate plan narrows the season to the episodes worth comparing
//!    ([`planning`]), and an anchor pass tries to pin the disc's window
//!    ([`anchor`]).
//! 3. Each strategy fetches references ([`references`]), re-weights both
//!    sides with a window-local IDF, and solves an optimal assignment
//!    ([`assignment`]).
//! 4. The best outcome is forced onto a contiguous episode block
//!    ([`refinement`]) and, when a language model is configured,
//!    low-confidence matches are cross-checked ([`verification`]).
//! 5. Accepted matches and telemetry are written back onto the rip spec
//!    ([`ripspec`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use ripmatch_core::{EpisodeMatcher, MatchPolicy, RipSpec};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(
//! #     transcriber: Arc<dyn ripmatch_core::external::Transcriber>,
//! #     catalog: Arc<dyn ripmatch_core::external::SeasonCatalog>,
//! #     source: Arc<dyn ripmatch_core::external::ReferenceSource>,
//! #     cache: Arc<dyn ripmatch_core::external::ReferenceCache>,
//! #     normalizer: Arc<dyn ripmatch_core::external::SubtitleNormalizer>,
//! # ) -> ripmatch_core::Result<()> {
//! let matcher = EpisodeMatcher::new(
//!     transcriber,
//!     catalog,
//!     source,
//!     cache,
//!     normalizer,
//!     MatchPolicy::default(),
//! );
//!
//! let mut spec: RipSpec = serde_json::from_str("{}")?;
//! let outcome = matcher
//!     .match_disc(&mut spec, Path::new("/staging"), &CancellationToken::new())
//!     .await?;
//! println!("applied: {}, matches: {}", outcome.applied, outcome.matches.len());
//! # Ok(())
//! # }
//! ```

pub mod anchor;
pub mod assignment;
pub mod error;
pub mod external;
pub mod fingerprint;
pub mod matcher;
pub mod planning;
pub mod progress;
pub mod references;
pub mod refinement;
pub mod ripspec;
pub mod strategy;
pub mod types;
pub mod verification;

pub use anchor::AnchorSelection;
pub use error::{Error, Result};
pub use fingerprint::{cosine, Fingerprint, IdfTable};
pub use matcher::EpisodeMatcher;
pub use planning::CandidatePlan;
pub use progress::{ProgressFn, ProgressPhase, ProgressUpdate};
pub use ripspec::RipSpec;
pub use types::{
    AnchorFailure, AnchorReason, BlockRefinement, MatchOutcome, MatchPolicy, MatchResult,
    MatchState, PlanSource, ReferenceFingerprint, RipFingerprint, StrategyKind, StrategyScore,
};
