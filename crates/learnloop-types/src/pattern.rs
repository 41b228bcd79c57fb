//! Detected behavioral patterns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How much a pattern tends to hurt a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid impact {0:?}: must be low, medium, or high")]
pub struct ParseImpactError(pub String);

impl FromStr for Impact {
    type Err = ParseImpactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            other => Err(ParseImpactError(other.to_string())),
        }
    }
}

/// A named recurring signature with its accumulated frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Stable identifier, `pat-<name>`.
    pub id: String,
    /// Unique rule name (e.g. "tests-failed").
    pub name: String,
    pub description: String,
    /// Free-form grouping such as "process", "code" or "scope".
    pub category: String,
    pub impact: Impact,
    /// Outcome this pattern tends to accompany ("failure", "partial", ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub outcome_correlation: String,
    /// Number of runs matched so far. Never decreases.
    pub frequency: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Pattern {
    /// Identifier used for a pattern with the given name.
    pub fn id_for(name: &str) -> String {
        format!("pat-{}", name)
    }
}

/// Name, frequency and impact of one pattern, for summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub name: String,
    pub count: u32,
    pub impact: Impact,
}

impl From<&Pattern> for PatternSummary {
    fn from(p: &Pattern) -> Self {
        Self {
            name: p.name.clone(),
            count: p.frequency,
            impact: p.impact,
        }
    }
}

/// How often a pattern occurred within a subset of runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStat {
    pub name: String,
    pub description: String,
    pub count: u32,
    pub impact: Impact,
}
