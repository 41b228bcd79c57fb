//! Error types for learnloop.

use learnloop_types::ParseOutcomeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidOutcome(#[from] ParseOutcomeError),

    #[error("Invalid run record: {0}")]
    InvalidRecord(String),

    #[error("Run {0:?} already ingested")]
    DuplicateRun(String),

    #[error("Insight {0:?} already exists")]
    DuplicateInsight(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Storage error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl LoopError {
    /// True for the uniqueness conflicts the store reports on duplicate ids.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LoopError::DuplicateRun(_) | LoopError::DuplicateInsight(_))
    }

    /// True for errors raised before anything was written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LoopError::MissingField(_) | LoopError::InvalidOutcome(_) | LoopError::InvalidRecord(_)
        )
    }
}

/// Attach the name of the storage operation to a raw SQLite error.
pub(crate) trait StorageContext<T> {
    fn during(self, operation: &'static str) -> crate::Result<T>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn during(self, operation: &'static str) -> crate::Result<T> {
        self.map_err(|source| LoopError::Storage { operation, source })
    }
}
