/// Result type alias for matcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the episode matching engine
///
/// Soft "needs review" conditions are deliberately not errors: the matcher
/// reports them through the rip-spec attributes and returns
/// `applied = false` instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required input is missing (no ripped episodes, no TMDB id, no work dir)
    #[error("Invalid input: {0}")]
    Input(String),

    /// Speech-to-text transcription of a ripped file failed
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Reference subtitle search or download failed
    #[error("Reference error: {0}")]
    Reference(String),

    /// Season catalog lookup failed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Subtitle normalization or windowing failed
    #[error("Subtitle error: {0}")]
    Subtitle(String),

    /// LLM transport or completion failure that had to surface
    #[error("LLM error: {0}")]
    Llm(String),

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Programmer error (mismatched solver dimensions and the like)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is recoverable (the caller may retry the item)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Transcription(_)
            | Error::Reference(_)
            | Error::Catalog(_)
            | Error::Subtitle(_)
            | Error::Llm(_)
            | Error::Io(_) => true,
            Error::Input(_)
            | Error::Cancelled
            | Error::Serialization(_)
            | Error::Internal(_) => false,
        }
    }
}
