//! Command handlers exercised in-process against a temporary database.

use learnloop_cli::commands::{self, QueryFormat};
use learnloop_core::{Repository, SqliteStore};
use learnloop_types::Outcome;
use std::path::PathBuf;
use tempfile::TempDir;

struct TestEnv {
    dir: TempDir,
    store: SqliteStore,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = commands::open_store(&dir.path().join(".learning-loop").join("loop.db")).unwrap();
        Self { dir, store }
    }

    fn write_run(&self, name: &str, json: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, json).unwrap();
        path
    }

    fn ingest(&self, json: &str) -> String {
        let path = self.write_run("run.json", json);
        let mut out = Vec::new();
        commands::ingest(&self.store, path.to_str().unwrap(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }
}

fn capture<F>(f: F) -> String
where
    F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
{
    let mut out = Vec::new();
    f(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_init_creates_database() {
    let env = TestEnv::new();
    let out = capture(|w| commands::init(&env.store, w));
    assert!(out.contains("Learning Loop initialized"));
    assert!(out.contains("loop.db"));
    assert!(env.store.path().exists());
}

#[test]
fn test_ingest_reports_patterns() {
    let env = TestEnv::new();
    let out = env.ingest(
        r#"{"id":"r1","task":"Fix bug","outcome":"failure","tests_passed":false,"duration_seconds":20}"#,
    );
    assert!(out.contains("Ingested r1 [failure]"));
    assert!(out.contains("Patterns: tests-failed, quick-failure"));
    assert!(env.store.run_exists("r1").unwrap());
}

#[test]
fn test_ingest_errors() {
    let env = TestEnv::new();
    let mut out = Vec::new();

    let missing = env.dir.path().join("missing.json");
    assert!(commands::ingest(&env.store, missing.to_str().unwrap(), &mut out).is_err());

    let malformed = env.write_run("bad.json", "{nope");
    assert!(commands::ingest(&env.store, malformed.to_str().unwrap(), &mut out).is_err());

    env.ingest(r#"{"id":"dup","task":"t","outcome":"success"}"#);
    let again = env.write_run("dup.json", r#"{"id":"dup","task":"t","outcome":"success"}"#);
    let err = commands::ingest(&env.store, again.to_str().unwrap(), &mut out).unwrap_err();
    assert!(err.to_string().contains("already ingested"));
}

#[test]
fn test_open_store_fails_for_unusable_path() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();
    assert!(commands::open_store(&blocker.join("loop.db")).is_err());
}

#[test]
fn test_query_formats() {
    let env = TestEnv::new();
    env.ingest(
        r#"{"id":"auth-1","task":"Fix authentication bug","outcome":"failure",
            "tests_passed":false,"tags":["auth","bug"]}"#,
    );

    let human = capture(|w| commands::query(&env.store, "fix auth bug", 10, QueryFormat::Human, w));
    assert!(human.contains("LEARNINGS"));
    assert!(human.contains("tests-failed"));

    let json = capture(|w| commands::query(&env.store, "fix auth bug", 10, QueryFormat::Json, w));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["matched_runs"], 1);
    assert_eq!(value["relevant_runs"][0]["id"], "auth-1");

    let inject = capture(|w| commands::query(&env.store, "fix auth bug", 10, QueryFormat::Inject, w));
    assert!(inject.starts_with("## Learnings for: \"fix auth bug\""));
}

#[test]
fn test_query_empty_database() {
    let env = TestEnv::new();
    let out = capture(|w| commands::query(&env.store, "anything", 0, QueryFormat::Human, w));
    assert!(out.contains("No relevant learnings found"));
}

#[test]
fn test_analyze_then_status() {
    let env = TestEnv::new();
    for i in 0..6 {
        let (outcome, passed) = if i == 0 { ("success", true) } else { ("failure", false) };
        env.ingest(&format!(
            r#"{{"id":"ls{i}","task":"t{i}","outcome":"{outcome}","timestamp":"2026-01-01T0{i}:00:00Z","tests_passed":{passed}}}"#
        ));
    }

    let analyzed = capture(|w| commands::analyze(&env.store, false, w));
    assert!(analyzed.contains("Analyzed 6 new runs"));
    assert!(analyzed.contains("tests-failed (5x)"));
    assert!(analyzed.contains("Insights: 2 new"));

    let again = capture(|w| commands::analyze(&env.store, true, w));
    let value: serde_json::Value = serde_json::from_str(&again).unwrap();
    assert_eq!(value["runs_analyzed"], 0);

    let status = capture(|w| commands::status(&env.store, false, w));
    assert!(status.contains("Runs: 6 total (1 success, 5 failure, 0 other)"));
    assert!(status.contains("Low success rate"));

    let json = capture(|w| commands::status(&env.store, true, w));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["total_runs"], 6);
    assert_eq!(value["insights"].as_array().unwrap().len(), 2);
}

#[test]
fn test_patterns_listing() {
    let env = TestEnv::new();
    assert!(capture(|w| commands::patterns(&env.store, false, w)).contains("No patterns detected yet"));

    env.ingest(r#"{"id":"r1","task":"t","outcome":"partial","lint_passed":false}"#);
    let out = capture(|w| commands::patterns(&env.store, false, w));
    assert!(out.contains("tests-skipped"));
    assert!(out.contains("lint-failed"));

    let json = capture(|w| commands::patterns(&env.store, true, w));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
}

#[test]
fn test_insights_tag_filter_and_deactivate() {
    let env = TestEnv::new();
    for i in 0..3 {
        env.ingest(&format!(
            r#"{{"id":"f{i}","task":"t","outcome":"failure","tests_passed":false}}"#
        ));
    }
    capture(|w| commands::analyze(&env.store, false, w));

    let testing = capture(|w| commands::insights(&env.store, &["testing".to_string()], true, w));
    let value: serde_json::Value = serde_json::from_str(&testing).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);

    let scope = capture(|w| commands::insights(&env.store, &["scope".to_string()], false, w));
    assert!(scope.contains("No insights yet"));

    let out = capture(|w| commands::deactivate(&env.store, "ins-tests-failed-3", w));
    assert!(out.contains("Deactivated insight ins-tests-failed-3"));
    let out = capture(|w| commands::deactivate(&env.store, "ins-tests-failed-3", w));
    assert!(out.contains("No insight with id"));

    assert!(capture(|w| commands::insights(&env.store, &[], false, w)).contains("No insights yet"));
}

#[test]
fn test_runs_listing_limit_and_filter() {
    let env = TestEnv::new();
    for (i, outcome) in ["success", "failure", "partial", "error"].iter().enumerate() {
        env.ingest(&format!(
            r#"{{"id":"r{i}","task":"task {i}","outcome":"{outcome}","timestamp":"2026-01-0{}T00:00:00Z"}}"#,
            i + 1
        ));
    }

    let all = capture(|w| commands::runs(&env.store, 0, None, true, w));
    let value: serde_json::Value = serde_json::from_str(&all).unwrap();
    let ids: Vec<_> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["r3", "r2", "r1", "r0"]);

    let last_two = capture(|w| commands::runs(&env.store, 2, None, true, w));
    let value: serde_json::Value = serde_json::from_str(&last_two).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);

    let failures = capture(|w| commands::runs(&env.store, 0, Some(Outcome::Failure), false, w));
    assert!(failures.contains("r1"));
    assert!(!failures.contains("r0"));
    assert!(failures.contains("Recent Runs"));
}
