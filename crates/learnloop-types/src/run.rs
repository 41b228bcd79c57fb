//! Run records: one agent task execution and how it ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
    Error,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::Success,
        Outcome::Partial,
        Outcome::Failure,
        Outcome::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failure => "failure",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the four outcome labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid outcome {0:?}: must be success, partial, failure, or error")]
pub struct ParseOutcomeError(pub String);

impl FromStr for Outcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Outcome::Success),
            "partial" => Ok(Outcome::Partial),
            "failure" => Ok(Outcome::Failure),
            "error" => Ok(Outcome::Error),
            other => Err(ParseOutcomeError(other.to_string())),
        }
    }
}

/// A run record exactly as submitted for ingestion.
///
/// Every field is optional here so that a missing `id` or a bogus `outcome`
/// surfaces as a validation error rather than a parse error. `null` and an
/// absent key are treated the same way.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunRecord {
    pub id: Option<String>,
    pub task: Option<String>,
    pub outcome: Option<String>,
    pub duration_seconds: Option<i64>,
    pub timestamp: Option<String>,
    pub tools_used: Option<Vec<String>>,
    pub files_touched: Option<Vec<String>>,
    pub tests_passed: Option<bool>,
    pub lint_passed: Option<bool>,
    pub error_message: Option<String>,
    pub tags: Option<Vec<String>>,
    pub agent: Option<String>,
    pub model: Option<String>,
    pub metadata: Option<Value>,
}

/// A validated, stored run.
///
/// Immutable once stored except for `analyzed`, which flips to true once the
/// synthesizer has folded the run into its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub task: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    /// RFC 3339 timestamp. Stored verbatim; may fail to parse for imported data.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_touched: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint_passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    #[serde(default, skip_serializing)]
    pub analyzed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Run {
    /// Minimal run with the three required fields; everything else unset.
    pub fn new(
        id: impl Into<String>,
        task: impl Into<String>,
        outcome: Outcome,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            outcome,
            duration_seconds: None,
            timestamp: timestamp.into(),
            tools_used: Vec::new(),
            files_touched: Vec::new(),
            tests_passed: None,
            lint_passed: None,
            error_message: None,
            tags: Vec::new(),
            agent: String::new(),
            model: String::new(),
            metadata: Value::Object(Default::default()),
            analyzed: false,
            created_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// The run's timestamp, if it is valid RFC 3339.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    /// True when the run carries a non-empty error message.
    pub fn has_error_text(&self) -> bool {
        self.error_message.as_deref().is_some_and(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trips_through_str() {
        for outcome in Outcome::ALL {
            assert_eq!(outcome.as_str().parse::<Outcome>().unwrap(), outcome);
        }
        assert!("done".parse::<Outcome>().is_err());
        assert!("Success".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_record_treats_null_as_absent() {
        let record: RunRecord = serde_json::from_str(
            r#"{"id":"r1","task":"t","outcome":"success","tags":null,"duration_seconds":null,"extra":1}"#,
        )
        .unwrap();
        assert_eq!(record.id.as_deref(), Some("r1"));
        assert!(record.tags.is_none());
        assert!(record.duration_seconds.is_none());
    }

    #[test]
    fn test_run_json_omits_unset_fields() {
        let run = Run::new("r1", "Fix bug", Outcome::Failure, "2026-02-22T14:00:00Z");
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert!(json.get("tests_passed").is_none());
        assert!(json.get("analyzed").is_none());
    }

    #[test]
    fn test_parsed_timestamp() {
        let mut run = Run::new("r1", "t", Outcome::Success, "2026-02-22T14:00:00Z");
        assert!(run.parsed_timestamp().is_some());
        run.timestamp = "not-a-timestamp".into();
        assert!(run.parsed_timestamp().is_none());
    }

    #[test]
    fn test_has_error_text() {
        let mut run = Run::new("r1", "t", Outcome::Success, "2026-01-01T00:00:00Z");
        assert!(!run.has_error_text());
        run.error_message = Some(String::new());
        assert!(!run.has_error_text());
        run.error_message = Some("boom".into());
        assert!(run.has_error_text());
    }
}
