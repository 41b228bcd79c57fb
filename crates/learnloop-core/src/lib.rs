//! Pattern detection, insight synthesis and relevance queries over agent run history.

pub mod detector;
mod error;
mod ingest;
mod query;
mod report;
mod repository;
pub mod scoring;
mod store;
mod synthesizer;

pub use detector::{detect_and_store, matching_rules, Rule, RULES};
pub use error::LoopError;
pub use ingest::Ingester;
pub use query::{QueryEngine, QueryResult, ScoredRun, DEFAULT_MAX_RUNS};
pub use report::Report;
pub use repository::{Repository, RunCounts};
pub use store::SqliteStore;
pub use synthesizer::{SynthesisReport, Synthesizer};

/// Result type for learnloop operations.
pub type Result<T> = std::result::Result<T, LoopError>;
