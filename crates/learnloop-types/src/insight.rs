//! Synthesized insights.

use serde::{Deserialize, Serialize};

/// Cadence label attached to insights produced by the synthesizer.
pub const ANALYSIS_CADENCE: &str = "analysis";

/// A natural-language statement derived from pattern frequency or run stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// `ins-<pattern>-<total runs>` or `ins-overall-<total runs>`.
    pub id: String,
    pub text: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Total run count at the time the insight was synthesized.
    pub based_on_runs: u32,
    /// Names of the patterns this insight was derived from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub cadence: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl Insight {
    /// Whether any of this insight's tags appears in `wanted`.
    pub fn has_any_tag(&self, wanted: &[String]) -> bool {
        self.tags.iter().any(|t| wanted.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_any_tag() {
        let insight = Insight {
            id: "ins-1".into(),
            text: "Run the tests".into(),
            confidence: 0.5,
            based_on_runs: 3,
            patterns: vec![],
            tags: vec!["A".into(), "B".into()],
            cadence: ANALYSIS_CADENCE.into(),
            active: true,
            created_at: None,
            expires_at: None,
        };
        assert!(insight.has_any_tag(&["A".into()]));
        assert!(insight.has_any_tag(&["C".into(), "B".into()]));
        assert!(!insight.has_any_tag(&["C".into()]));
        assert!(!insight.has_any_tag(&[]));
    }
}
