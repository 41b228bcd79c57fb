//! Rule-based pattern detection, evaluated once per run at ingestion.
//!
//! The rule list is ordered and the order is observable: matched pattern
//! names are reported in declaration order.

use crate::repository::Repository;
use crate::Result;
use learnloop_types::{Impact, Outcome, Pattern, Run};

/// Runs longer than this (or touching more files than [`SCOPE_CREEP_FILES`])
/// count as scope creep.
pub const SCOPE_CREEP_SECONDS: i64 = 1800;
pub const SCOPE_CREEP_FILES: usize = 8;
pub const QUICK_FAILURE_SECONDS: i64 = 60;
pub const LONG_RUNNING_SECONDS: i64 = 3600;

const SOURCE_EXTENSIONS: &[&str] = &[".go", ".ts", ".js", ".py", ".rs", ".java"];
const TEST_MARKERS: &[&str] = &["_test", ".test.", "test_"];

/// One detection rule: pattern metadata plus the predicate that fires it.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub impact: Impact,
    pub correlation: Outcome,
    predicate: fn(&Run) -> bool,
}

impl Rule {
    pub fn matches(&self, run: &Run) -> bool {
        (self.predicate)(run)
    }

    /// A single-occurrence pattern record for this rule, seen at `timestamp`.
    pub fn to_pattern(&self, timestamp: &str) -> Pattern {
        Pattern {
            id: Pattern::id_for(self.name),
            name: self.name.to_string(),
            description: self.description.to_string(),
            category: self.category.to_string(),
            impact: self.impact,
            outcome_correlation: self.correlation.as_str().to_string(),
            frequency: 1,
            first_seen: Some(timestamp.to_string()),
            last_seen: Some(timestamp.to_string()),
            created_at: None,
        }
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "tests-skipped",
        description: "Agent completed the task but did not run tests",
        category: "process",
        impact: Impact::High,
        correlation: Outcome::Failure,
        predicate: tests_skipped,
    },
    Rule {
        name: "tests-failed",
        description: "Tests were run but failed",
        category: "code",
        impact: Impact::High,
        correlation: Outcome::Failure,
        predicate: tests_failed,
    },
    Rule {
        name: "lint-failed",
        description: "Linter was run but found issues",
        category: "code",
        impact: Impact::Medium,
        correlation: Outcome::Partial,
        predicate: lint_failed,
    },
    Rule {
        name: "scope-creep",
        description: "Task took too long or touched too many files, suggesting scope expansion",
        category: "scope",
        impact: Impact::Medium,
        correlation: Outcome::Failure,
        predicate: scope_creep,
    },
    Rule {
        name: "quick-failure",
        description: "Task failed very quickly, suggesting a fundamental misunderstanding or blocker",
        category: "process",
        impact: Impact::High,
        correlation: Outcome::Failure,
        predicate: quick_failure,
    },
    Rule {
        name: "long-running",
        description: "Task took over an hour, suggesting high complexity or inefficiency",
        category: "scope",
        impact: Impact::Medium,
        correlation: Outcome::Partial,
        predicate: long_running,
    },
    Rule {
        name: "no-test-files",
        description: "Source files were modified but no test files were touched",
        category: "process",
        impact: Impact::Medium,
        correlation: Outcome::Failure,
        predicate: no_test_files,
    },
    Rule {
        name: "success-with-errors",
        description: "Task was marked successful but had an error message",
        category: "process",
        impact: Impact::Medium,
        correlation: Outcome::Partial,
        predicate: success_with_errors,
    },
];

fn tests_skipped(run: &Run) -> bool {
    run.outcome != Outcome::Success && run.tests_passed.is_none()
}

fn tests_failed(run: &Run) -> bool {
    run.tests_passed == Some(false)
}

fn lint_failed(run: &Run) -> bool {
    run.lint_passed == Some(false)
}

fn scope_creep(run: &Run) -> bool {
    run.duration_seconds.is_some_and(|d| d > SCOPE_CREEP_SECONDS)
        || run.files_touched.len() > SCOPE_CREEP_FILES
}

fn quick_failure(run: &Run) -> bool {
    run.outcome == Outcome::Failure
        && run.duration_seconds.is_some_and(|d| d < QUICK_FAILURE_SECONDS)
}

fn long_running(run: &Run) -> bool {
    run.duration_seconds.is_some_and(|d| d > LONG_RUNNING_SECONDS)
}

fn no_test_files(run: &Run) -> bool {
    let mut has_source = false;
    for file in &run.files_touched {
        let lower = file.to_lowercase();
        if is_test_file(&lower) {
            return false;
        }
        if SOURCE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            has_source = true;
        }
    }
    has_source
}

fn success_with_errors(run: &Run) -> bool {
    run.outcome == Outcome::Success && run.has_error_text()
}

/// Expects a lower-cased path.
fn is_test_file(lower: &str) -> bool {
    TEST_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Rules that fire for `run`, in declaration order. Pure; touches no storage.
pub fn matching_rules(run: &Run) -> impl Iterator<Item = &'static Rule> + '_ {
    RULES.iter().filter(move |rule| rule.matches(run))
}

/// Evaluate every rule against `run`, recording each match.
///
/// For a matching rule the pattern is upserted (created with frequency 1, or
/// incremented) and a run→pattern match is added. Returns matched names in
/// rule order. The first storage failure aborts evaluation and is returned;
/// no partial list is reported.
pub fn detect_and_store(repo: &dyn Repository, run: &Run) -> Result<Vec<String>> {
    let mut matched = Vec::new();
    for rule in matching_rules(run) {
        let pattern = rule.to_pattern(&run.timestamp);
        repo.upsert_pattern(&pattern)?;
        repo.add_pattern_match(&run.id, &pattern.id)?;
        tracing::debug!(target: "learnloop::detect", "Run {} matched {}", run.id, rule.name);
        matched.push(rule.name.to_string());
    }
    Ok(matched)
}
