//! Point-in-time status report over the whole store.

use crate::repository::Repository;
use crate::Result;
use learnloop_types::{Insight, Pattern};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub total_runs: u32,
    pub success_runs: u32,
    pub failure_runs: u32,
    pub success_rate: f64,
    /// Most frequent first.
    pub patterns: Vec<Pattern>,
    /// Active insights only.
    pub insights: Vec<Insight>,
}

impl Report {
    pub fn generate(repo: &dyn Repository) -> Result<Self> {
        let counts = repo.count_runs()?;
        let patterns = repo.list_patterns()?;
        let insights = repo.list_insights(true, &[])?;

        let success_rate = if counts.total > 0 {
            f64::from(counts.success) / f64::from(counts.total)
        } else {
            0.0
        };

        Ok(Self {
            total_runs: counts.total,
            success_runs: counts.success,
            failure_runs: counts.failure,
            success_rate,
            patterns,
            insights,
        })
    }

    /// Runs that were neither successes nor failures.
    pub fn other_runs(&self) -> u32 {
        self.total_runs
            .saturating_sub(self.success_runs)
            .saturating_sub(self.failure_runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ingester, SqliteStore, Synthesizer};
    use tempfile::TempDir;

    #[test]
    fn test_empty_report() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("loop.db")).unwrap();
        let report = Report::generate(&store).unwrap();
        assert_eq!(report.total_runs, 0);
        assert_eq!(report.success_rate, 0.0);
        assert!(report.patterns.is_empty());
        assert!(report.insights.is_empty());
    }

    #[test]
    fn test_report_counts_and_hides_inactive_insights() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("loop.db")).unwrap();
        let ingester = Ingester::new(&store);
        for (i, outcome) in ["success", "failure", "failure", "failure", "partial"].iter().enumerate() {
            ingester
                .ingest_json(&format!(
                    r#"{{"id":"r{i}","task":"t","outcome":"{outcome}","tests_passed":false}}"#
                ))
                .unwrap();
        }
        let created = Synthesizer::new(&store).synthesize().unwrap().insights_created;
        assert_eq!(created.len(), 2);

        let report = Report::generate(&store).unwrap();
        assert_eq!(report.total_runs, 5);
        assert_eq!(report.success_runs, 1);
        assert_eq!(report.failure_runs, 3);
        assert_eq!(report.other_runs(), 1);
        assert!((report.success_rate - 0.2).abs() < 1e-9);
        assert_eq!(report.patterns[0].name, "tests-failed");
        assert_eq!(report.patterns[0].frequency, 5);
        assert_eq!(report.insights.len(), 2);

        assert!(store.deactivate_insight(&created[0].id).unwrap());
        assert_eq!(Report::generate(&store).unwrap().insights.len(), 1);
    }
}
