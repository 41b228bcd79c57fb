//! Aggregate statistics over the run history. Never persisted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u32,
}

/// Totals and rates over every stored run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_runs: u32,
    pub success_runs: u32,
    pub failure_runs: u32,
    pub success_rate: f64,
    pub failure_rate: f64,
    /// Mean over runs that reported a duration; 0 when none did.
    #[serde(rename = "avg_duration_seconds")]
    pub avg_duration: f64,
    /// Most frequent tags, descending, at most ten.
    #[serde(default)]
    pub top_tags: Vec<TagCount>,
}
