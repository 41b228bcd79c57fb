//! Run ingestion: parse, validate, persist, then detect patterns.

use crate::detector;
use crate::repository::Repository;
use crate::{LoopError, Result};
use chrono::{SecondsFormat, Utc};
use learnloop_types::{Outcome, Run, RunRecord};
use serde_json::Value;
use std::io::Read;
use tracing::info;

/// Accepts run records and feeds them through the pattern detector.
pub struct Ingester<'a> {
    repo: &'a dyn Repository,
}

impl<'a> Ingester<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Read the whole of `reader` as one JSON run record and ingest it.
    pub fn ingest_reader(&self, mut reader: impl Read) -> Result<(Run, Vec<String>)> {
        let mut data = String::new();
        reader.read_to_string(&mut data)?;
        self.ingest_json(&data)
    }

    /// Ingest one JSON run record.
    ///
    /// Returns the stored run and the names of the patterns it matched, in
    /// rule order. Nothing is written when validation fails or the id is
    /// already present.
    pub fn ingest_json(&self, data: &str) -> Result<(Run, Vec<String>)> {
        if data.trim().is_empty() {
            return Err(LoopError::InvalidRecord("empty input".to_string()));
        }
        let record: RunRecord = serde_json::from_str(data)
            .map_err(|e| LoopError::InvalidRecord(e.to_string()))?;
        self.ingest_record(record)
    }

    /// Validate and store an already-parsed record.
    pub fn ingest_record(&self, record: RunRecord) -> Result<(Run, Vec<String>)> {
        let run = validate(record)?;

        if self.repo.run_exists(&run.id)? {
            return Err(LoopError::DuplicateRun(run.id));
        }
        self.repo.insert_run(&run)?;

        let matched = detector::detect_and_store(self.repo, &run)?;
        info!(
            target: "learnloop::ingest",
            "Ingested run {} ({}), {} pattern(s) matched",
            run.id,
            run.outcome,
            matched.len()
        );
        Ok((run, matched))
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(LoopError::MissingField(field))
}

/// Turn a raw record into a run, defaulting the timestamp to now.
fn validate(record: RunRecord) -> Result<Run> {
    let id = required(record.id, "id")?;
    let task = required(record.task, "task")?;
    let outcome: Outcome = required(record.outcome, "outcome")?.parse()?;
    let timestamp = record
        .timestamp
        .filter(|ts| !ts.is_empty())
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

    Ok(Run {
        id,
        task,
        outcome,
        duration_seconds: record.duration_seconds,
        timestamp,
        tools_used: record.tools_used.unwrap_or_default(),
        files_touched: record.files_touched.unwrap_or_default(),
        tests_passed: record.tests_passed,
        lint_passed: record.lint_passed,
        error_message: record.error_message,
        tags: record.tags.unwrap_or_default(),
        agent: record.agent.unwrap_or_default(),
        model: record.model.unwrap_or_default(),
        metadata: record
            .metadata
            .filter(|m| !m.is_null())
            .unwrap_or_else(|| Value::Object(Default::default())),
        analyzed: false,
        created_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("loop.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_ingest_stores_run_and_patterns() {
        let (store, _dir) = create_test_store();
        let ingester = Ingester::new(&store);

        let (run, matched) = ingester
            .ingest_json(
                r#"{
                    "id": "run-001",
                    "task": "Fix auth bug",
                    "outcome": "failure",
                    "duration_seconds": 30,
                    "timestamp": "2026-02-22T14:00:00Z",
                    "tests_passed": false,
                    "files_touched": ["auth.go"],
                    "tags": ["auth"]
                }"#,
            )
            .unwrap();

        assert_eq!(run.outcome, Outcome::Failure);
        assert_eq!(matched, ["tests-failed", "quick-failure", "no-test-files"]);

        let stored = store.get_run("run-001").unwrap();
        assert_eq!(stored.task, "Fix auth bug");
        assert_eq!(stored.tags, ["auth"]);
        assert_eq!(store.patterns_for_run("run-001").unwrap().len(), 3);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let (store, _dir) = create_test_store();
        let ingester = Ingester::new(&store);

        let cases = [
            (r#"{"task":"t","outcome":"success"}"#, "id"),
            (r#"{"id":"r1","outcome":"success"}"#, "task"),
            (r#"{"id":"r1","task":"t"}"#, "outcome"),
            (r#"{"id":"","task":"t","outcome":"success"}"#, "id"),
            (r#"{"id":"r1","task":null,"outcome":"success"}"#, "task"),
        ];
        for (json, field) in cases {
            match ingester.ingest_json(json) {
                Err(LoopError::MissingField(f)) => assert_eq!(f, field),
                other => panic!("expected MissingField({}), got {:?}", field, other),
            }
        }
        assert_eq!(store.count_runs().unwrap().total, 0);
    }

    #[test]
    fn test_invalid_outcome() {
        let (store, _dir) = create_test_store();
        let err = Ingester::new(&store)
            .ingest_json(r#"{"id":"r1","task":"t","outcome":"done"}"#)
            .unwrap_err();
        assert!(matches!(err, LoopError::InvalidOutcome(_)));
        assert!(err.is_validation());
        assert!(err.to_string().contains("done"));
    }

    #[test]
    fn test_empty_and_malformed_input() {
        let (store, _dir) = create_test_store();
        let ingester = Ingester::new(&store);
        for input in ["", "   \n", "{not json", "[1, 2]"] {
            assert!(
                matches!(ingester.ingest_json(input), Err(LoopError::InvalidRecord(_))),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_duplicate_run_is_rejected() {
        let (store, _dir) = create_test_store();
        let ingester = Ingester::new(&store);
        let json = r#"{"id":"r1","task":"t","outcome":"success","tests_passed":true}"#;

        ingester.ingest_json(json).unwrap();
        let err = ingester.ingest_json(json).unwrap_err();
        assert!(matches!(err, LoopError::DuplicateRun(ref id) if id == "r1"));
        assert_eq!(store.count_runs().unwrap().total, 1);
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let (store, _dir) = create_test_store();
        let before = Utc::now().timestamp();
        let (run, _) = Ingester::new(&store)
            .ingest_json(r#"{"id":"r1","task":"t","outcome":"success"}"#)
            .unwrap();

        assert!(run.timestamp.ends_with('Z'));
        assert_eq!(run.timestamp.len(), "2026-02-22T14:00:00Z".len());
        let ts = DateTime::parse_from_rfc3339(&run.timestamp).unwrap().timestamp();
        assert!(ts >= before - 1 && ts <= Utc::now().timestamp() + 1);
    }

    #[test]
    fn test_ingest_reader() {
        let (store, _dir) = create_test_store();
        let input = br#"{"id":"r1","task":"t","outcome":"partial","metadata":null}"#;
        let (run, matched) = Ingester::new(&store).ingest_reader(&input[..]).unwrap();
        assert_eq!(run.outcome, Outcome::Partial);
        assert_eq!(matched, ["tests-skipped"]);
        assert!(run.metadata.is_object());
    }
}
