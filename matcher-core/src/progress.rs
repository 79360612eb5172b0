//! Best-effort progress reporting.
//!
//! Callbacks run on the matcher's own execution context and must be fast:
//! no external I/O, no blocking. The matcher never depends on a callback
//! having run.

use std::sync::Arc;

/// Pipeline phase being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Transcribing ripped files
    Transcribe,
    /// Fetching reference subtitles
    Reference,
    /// Writing matches back onto the rip spec
    Apply,
}

/// One progress tick
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Phase being reported
    pub phase: ProgressPhase,
    /// 1-based position within the phase
    pub current: usize,
    /// Total items in the phase
    pub total: usize,
    /// Episode key the tick refers to
    pub episode_key: String,
}

/// Progress callback type; absent by default
pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;
