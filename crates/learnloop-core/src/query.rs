//! Relevance queries: "what should I know before starting this task?"

use crate::repository::Repository;
use crate::scoring::{extract_keywords, score_run};
use crate::Result;
use chrono::{DateTime, Utc};
use learnloop_types::{Insight, Outcome, PatternStat, Run};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_MAX_RUNS: usize = 10;
/// Runs must score strictly above this to be considered relevant.
pub const RELEVANCE_THRESHOLD: f64 = 0.5;
const MAX_PATTERNS: usize = 5;
const MAX_INSIGHTS: usize = 5;
const SIGNAL_MIN_SUPPORT: usize = 3;
const SIGNAL_MIN_RATE: f64 = 70.0;
const SHORT_RUN_SECONDS: i64 = 600;

/// A relevant run together with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRun {
    #[serde(flatten)]
    pub run: Run,
    pub score: f64,
}

/// Everything learned from history that bears on one task description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub total_runs: usize,
    pub matched_runs: usize,
    /// Success rate of the matched runs only.
    pub success_rate: f64,
    pub insights: Vec<Insight>,
    pub top_patterns: Vec<PatternStat>,
    pub success_signals: Vec<String>,
    pub relevant_runs: Vec<ScoredRun>,
}

impl QueryResult {
    /// True when neither runs nor insights were found.
    pub fn is_empty(&self) -> bool {
        self.matched_runs == 0 && self.insights.is_empty()
    }
}

pub struct QueryEngine<'a> {
    repo: &'a dyn Repository,
}

impl<'a> QueryEngine<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Query against the current time. `max_runs` of zero means the default.
    pub fn query(&self, text: &str, max_runs: usize) -> Result<QueryResult> {
        self.query_at(text, max_runs, Utc::now())
    }

    /// Query as if it were `now`. Read-only.
    pub fn query_at(&self, text: &str, max_runs: usize, now: DateTime<Utc>) -> Result<QueryResult> {
        let max_runs = if max_runs == 0 { DEFAULT_MAX_RUNS } else { max_runs };
        let keywords = extract_keywords(text);
        let all_runs = self.repo.list_runs(0, None)?;
        let total_runs = all_runs.len();

        let mut scored: Vec<ScoredRun> = all_runs
            .into_iter()
            .filter_map(|run| {
                let score = score_run(&run, &keywords, now);
                (score > RELEVANCE_THRESHOLD).then_some(ScoredRun { run, score })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.run.id.cmp(&b.run.id))
        });
        scored.truncate(max_runs);

        let successes = scored.iter().filter(|s| s.run.is_success()).count();
        let success_rate = if scored.is_empty() {
            0.0
        } else {
            successes as f64 / scored.len() as f64
        };

        let top_patterns = self.top_patterns(&scored)?;
        let insights = self.relevant_insights(&keywords)?;
        let success_signals = success_signals(&scored);

        debug!(
            target: "learnloop::query",
            "Query {:?}: {} keyword(s), {}/{} run(s) matched",
            text,
            keywords.len(),
            scored.len(),
            total_runs
        );

        Ok(QueryResult {
            query: text.to_string(),
            total_runs,
            matched_runs: scored.len(),
            success_rate,
            insights,
            top_patterns,
            success_signals,
            relevant_runs: scored,
        })
    }

    fn top_patterns(&self, scored: &[ScoredRun]) -> Result<Vec<PatternStat>> {
        let mut counts: HashMap<String, PatternStat> = HashMap::new();
        for sr in scored {
            for pattern in self.repo.patterns_for_run(&sr.run.id)? {
                counts
                    .entry(pattern.name.clone())
                    .and_modify(|stat| stat.count += 1)
                    .or_insert(PatternStat {
                        name: pattern.name,
                        description: pattern.description,
                        count: 1,
                        impact: pattern.impact,
                    });
            }
        }

        let mut stats: Vec<PatternStat> = counts.into_values().collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        stats.truncate(MAX_PATTERNS);
        Ok(stats)
    }

    /// Active insights tagged with any keyword, else the most confident ones.
    fn relevant_insights(&self, keywords: &[String]) -> Result<Vec<Insight>> {
        let mut insights = if keywords.is_empty() {
            Vec::new()
        } else {
            self.repo.list_insights(true, keywords)?
        };
        if insights.is_empty() {
            insights = self.repo.list_insights(true, &[])?;
        }
        insights.truncate(MAX_INSIGHTS);
        Ok(insights)
    }
}

/// Percent of successes among runs satisfying `pred`, if the support is big
/// enough and the rate high enough to report.
fn signal_rate(scored: &[ScoredRun], pred: impl Fn(&Run) -> bool) -> Option<f64> {
    let (support, wins) = scored
        .iter()
        .filter(|s| pred(&s.run))
        .fold((0usize, 0usize), |(n, w), s| {
            (n + 1, w + usize::from(s.run.outcome == Outcome::Success))
        });
    if support < SIGNAL_MIN_SUPPORT {
        return None;
    }
    let rate = wins as f64 / support as f64 * 100.0;
    (rate > SIGNAL_MIN_RATE).then_some(rate)
}

fn success_signals(scored: &[ScoredRun]) -> Vec<String> {
    let mut signals = Vec::new();

    let touched_tests = |run: &Run| {
        run.files_touched
            .iter()
            .any(|f| f.to_lowercase().contains("test"))
    };
    if let Some(rate) = signal_rate(scored, touched_tests) {
        signals.push(format!("Edited test files alongside source → {:.0}% success rate", rate));
    }

    let short = |run: &Run| run.duration_seconds.is_some_and(|d| d < SHORT_RUN_SECONDS);
    if let Some(rate) = signal_rate(scored, short) {
        signals.push(format!("Completed in under 10 minutes → {:.0}% success rate", rate));
    }

    let tests_passed = |run: &Run| run.tests_passed == Some(true);
    if let Some(rate) = signal_rate(scored, tests_passed) {
        signals.push(format!("Ran tests and they passed → {:.0}% success rate", rate));
    }

    signals
}
