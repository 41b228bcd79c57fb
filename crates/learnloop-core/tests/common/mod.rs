//! Common test utilities for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use learnloop_core::{LoopError, Repository, Result, RunCounts, SqliteStore};
use learnloop_types::{Insight, Outcome, Pattern, Run};
use std::cell::Cell;
use std::path::PathBuf;
use tempfile::TempDir;

/// Fresh store in a temporary directory. Keep the `TempDir` alive.
pub fn create_test_store() -> (SqliteStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("loop.db")).unwrap();
    (store, dir)
}

/// Raw JSON of a run fixture under `tests/fixtures/runs`.
pub fn load_run_fixture(name: &str) -> String {
    let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("runs")
        .join(format!("{}.json", name));

    std::fs::read_to_string(&fixture_path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", fixture_path.display(), e))
}

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-02-22T15:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// RFC 3339 timestamp `days` before [`fixed_now`].
pub fn days_ago(days: i64) -> String {
    (fixed_now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A run record as JSON with the given outcome and optional test result.
pub fn run_json(id: &str, outcome: Outcome, tests_passed: Option<bool>) -> String {
    let mut value = serde_json::json!({
        "id": id,
        "task": format!("Task {}", id),
        "outcome": outcome.as_str(),
        "timestamp": days_ago(1),
    });
    if let Some(passed) = tests_passed {
        value["tests_passed"] = passed.into();
    }
    value.to_string()
}

/// Repository wrapper that fails one named operation after `allow` successful
/// calls to it, delegating everything else to a real store.
pub struct FailingRepository<'a> {
    inner: &'a SqliteStore,
    fail_on: &'static str,
    allow: Cell<usize>,
}

impl<'a> FailingRepository<'a> {
    pub fn new(inner: &'a SqliteStore, fail_on: &'static str, allow: usize) -> Self {
        Self {
            inner,
            fail_on,
            allow: Cell::new(allow),
        }
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if operation != self.fail_on {
            return Ok(());
        }
        match self.allow.get() {
            0 => Err(LoopError::Io(std::io::Error::other(format!(
                "injected failure in {}",
                operation
            )))),
            n => {
                self.allow.set(n - 1);
                Ok(())
            }
        }
    }
}

impl Repository for FailingRepository<'_> {
    fn insert_run(&self, run: &Run) -> Result<()> {
        self.check("insert_run")?;
        self.inner.insert_run(run)
    }

    fn get_run(&self, id: &str) -> Result<Run> {
        self.inner.get_run(id)
    }

    fn list_runs(&self, limit: usize, outcome: Option<Outcome>) -> Result<Vec<Run>> {
        self.check("list_runs")?;
        self.inner.list_runs(limit, outcome)
    }

    fn run_exists(&self, id: &str) -> Result<bool> {
        self.inner.run_exists(id)
    }

    fn count_runs(&self) -> Result<RunCounts> {
        self.inner.count_runs()
    }

    fn unanalyzed_runs(&self) -> Result<Vec<Run>> {
        self.inner.unanalyzed_runs()
    }

    fn mark_runs_analyzed(&self, ids: &[String]) -> Result<()> {
        self.check("mark_runs_analyzed")?;
        self.inner.mark_runs_analyzed(ids)
    }

    fn upsert_pattern(&self, pattern: &Pattern) -> Result<()> {
        self.check("upsert_pattern")?;
        self.inner.upsert_pattern(pattern)
    }

    fn get_pattern_by_name(&self, name: &str) -> Result<Pattern> {
        self.inner.get_pattern_by_name(name)
    }

    fn list_patterns(&self) -> Result<Vec<Pattern>> {
        self.inner.list_patterns()
    }

    fn add_pattern_match(&self, run_id: &str, pattern_id: &str) -> Result<()> {
        self.check("add_pattern_match")?;
        self.inner.add_pattern_match(run_id, pattern_id)
    }

    fn patterns_for_run(&self, run_id: &str) -> Result<Vec<Pattern>> {
        self.check("patterns_for_run")?;
        self.inner.patterns_for_run(run_id)
    }

    fn insert_insight(&self, insight: &Insight) -> Result<()> {
        self.check("insert_insight")?;
        self.inner.insert_insight(insight)
    }

    fn list_insights(&self, active_only: bool, tags: &[String]) -> Result<Vec<Insight>> {
        self.inner.list_insights(active_only, tags)
    }

    fn deactivate_insight(&self, id: &str) -> Result<bool> {
        self.inner.deactivate_insight(id)
    }

    fn count_insights(&self) -> Result<u32> {
        self.inner.count_insights()
    }
}
