//! Error types for the suggestion engine

use thiserror::Error;

/// Result alias used across the learning modules
pub type Result<T> = std::result::Result<T, SuggestError>;

/// Errors surfaced by the suggestion engine.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// Caller broke the input contract (empty field name, negative limit, ...)
    #[error("invalid request: {0}")]
    Validation(String),

    /// Learning data could not be read or written
    #[error("learning data was not saved: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Storage-level failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored field history is corrupt: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Io(#[from] std::io::Error),
}

impl SuggestError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SuggestError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SuggestError::Validation(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, SuggestError::Persistence(_))
    }
}

impl From<rusqlite::Error> for SuggestError {
    fn from(err: rusqlite::Error) -> Self {
        SuggestError::Persistence(PersistenceError::Database(err))
    }
}

impl From<serde_json::Error> for SuggestError {
    fn from(err: serde_json::Error) -> Self {
        SuggestError::Persistence(PersistenceError::Codec(err))
    }
}

impl From<std::io::Error> for SuggestError {
    fn from(err: std::io::Error) -> Self {
        SuggestError::Persistence(PersistenceError::Io(err))
    }
}
