//! Error types for Harvest.

use thiserror::Error;

/// Library-level error type for Harvest operations.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("No captions available: {0}")]
    NoCaptions(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Reasoning service error: {0}")]
    Reasoning(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl HarvestError {
    /// Whether a later attempt (another relay, another method) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HarvestError::Transport(_) | HarvestError::Http(_))
    }

    /// Whether this error came from the persistence layer.
    pub fn is_persistence(&self) -> bool {
        matches!(self, HarvestError::Store(_) | HarvestError::Database(_))
    }
}

/// Result type alias for Harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;
