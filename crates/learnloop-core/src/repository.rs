//! Storage contract for runs, patterns, pattern matches and insights.

use crate::Result;
use learnloop_types::{Insight, Outcome, Pattern, Run};

/// Run totals as reported by [`Repository::count_runs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub total: u32,
    pub success: u32,
    pub failure: u32,
}

/// Durable store behind the detector, synthesizer and query engine.
///
/// Implementations enforce uniqueness of run ids, pattern names, insight ids
/// and (run, pattern) match pairs, and must not return from a write before it
/// is durable. Access is single-writer; callers serialize their own use.
pub trait Repository {
    /// Store a new run. Fails with `DuplicateRun` if the id is taken.
    fn insert_run(&self, run: &Run) -> Result<()>;

    /// Fetch one run, or `RunNotFound`.
    fn get_run(&self, id: &str) -> Result<Run>;

    /// Runs newest first. A `limit` of 0 means no limit.
    fn list_runs(&self, limit: usize, outcome: Option<Outcome>) -> Result<Vec<Run>>;

    fn run_exists(&self, id: &str) -> Result<bool>;

    fn count_runs(&self) -> Result<RunCounts>;

    /// Runs not yet folded into synthesis, oldest first.
    fn unanalyzed_runs(&self) -> Result<Vec<Run>>;

    /// Flag every listed run as analyzed in one transaction: either all of
    /// them are marked or none are.
    fn mark_runs_analyzed(&self, ids: &[String]) -> Result<()>;

    /// Insert the pattern, or merge into the existing one with the same name:
    /// frequency accumulates, `last_seen` and `description` are overwritten.
    fn upsert_pattern(&self, pattern: &Pattern) -> Result<()>;

    /// Fetch one pattern by name, or `PatternNotFound`.
    fn get_pattern_by_name(&self, name: &str) -> Result<Pattern>;

    /// All patterns, most frequent first.
    fn list_patterns(&self) -> Result<Vec<Pattern>>;

    /// Link a run to a pattern. Re-adding an existing pair is a no-op.
    fn add_pattern_match(&self, run_id: &str, pattern_id: &str) -> Result<()>;

    fn patterns_for_run(&self, run_id: &str) -> Result<Vec<Pattern>>;

    /// Store a new insight. Fails with `DuplicateInsight` if the id is taken.
    fn insert_insight(&self, insight: &Insight) -> Result<()>;

    /// Insights by descending confidence, then newest first. A non-empty
    /// `tags` keeps only insights carrying at least one of them.
    fn list_insights(&self, active_only: bool, tags: &[String]) -> Result<Vec<Insight>>;

    /// Soft-delete an insight. Returns false if it was unknown or already
    /// inactive.
    fn deactivate_insight(&self, id: &str) -> Result<bool>;

    /// Number of active insights.
    fn count_insights(&self) -> Result<u32>;
}
