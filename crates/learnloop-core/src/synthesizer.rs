//! Batch synthesis of insights from pattern frequencies and run statistics.

use crate::repository::Repository;
use crate::{LoopError, Result};
use learnloop_types::{Insight, Pattern, PatternSummary, Stats, TagCount, ANALYSIS_CADENCE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Patterns seen fewer times than this produce no insight.
pub const MIN_PATTERN_FREQUENCY: u32 = 3;
/// The overall success-rate insight needs at least this many runs.
pub const MIN_RUNS_FOR_OVERALL: u32 = 5;
pub const OVERALL_CONFIDENCE: f64 = 0.85;
const TOP_TAGS: usize = 10;

/// Outcome of one synthesis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub runs_analyzed: usize,
    pub patterns_found: Vec<PatternSummary>,
    /// Insights inserted by this call. Ones that already existed are left out.
    pub insights_created: Vec<Insight>,
    pub stats: Stats,
}

pub struct Synthesizer<'a> {
    repo: &'a dyn Repository,
}

impl<'a> Synthesizer<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Fold every unanalyzed run into the insight set.
    ///
    /// Runs are marked analyzed only after all insights were written. With no
    /// unanalyzed runs this is a no-op returning an empty report.
    pub fn synthesize(&self) -> Result<SynthesisReport> {
        let pending = self.repo.unanalyzed_runs()?;
        if pending.is_empty() {
            debug!(target: "learnloop::synthesize", "No unanalyzed runs");
            return Ok(SynthesisReport::default());
        }

        let stats = self.compute_stats()?;
        let patterns = self.repo.list_patterns()?;
        let patterns_found = patterns
            .iter()
            .filter(|p| p.frequency > 0)
            .map(PatternSummary::from)
            .collect();

        let mut insights_created = Vec::new();
        for insight in generate_insights(&patterns, &stats) {
            match self.repo.insert_insight(&insight) {
                Ok(()) => insights_created.push(insight),
                Err(LoopError::DuplicateInsight(id)) => {
                    debug!(target: "learnloop::synthesize", "Insight {} already exists", id);
                }
                Err(e) => return Err(e),
            }
        }

        let ids: Vec<String> = pending.iter().map(|r| r.id.clone()).collect();
        self.repo.mark_runs_analyzed(&ids)?;

        info!(
            target: "learnloop::synthesize",
            "Analyzed {} run(s), created {} insight(s)",
            pending.len(),
            insights_created.len()
        );
        Ok(SynthesisReport {
            runs_analyzed: pending.len(),
            patterns_found,
            insights_created,
            stats,
        })
    }

    /// Statistics over the whole run history.
    pub fn compute_stats(&self) -> Result<Stats> {
        let counts = self.repo.count_runs()?;
        let mut stats = Stats {
            total_runs: counts.total,
            success_runs: counts.success,
            failure_runs: counts.failure,
            ..Stats::default()
        };
        if counts.total > 0 {
            stats.success_rate = f64::from(counts.success) / f64::from(counts.total);
            stats.failure_rate = f64::from(counts.failure) / f64::from(counts.total);
        }

        let runs = self.repo.list_runs(0, None)?;
        let durations: Vec<i64> = runs.iter().filter_map(|r| r.duration_seconds).collect();
        if !durations.is_empty() {
            stats.avg_duration = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
        }

        let mut tag_counts: HashMap<&str, u32> = HashMap::new();
        for tag in runs.iter().flat_map(|r| &r.tags) {
            *tag_counts.entry(tag.as_str()).or_default() += 1;
        }
        let mut top_tags: Vec<TagCount> = tag_counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect();
        top_tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        top_tags.truncate(TOP_TAGS);
        stats.top_tags = top_tags;

        Ok(stats)
    }
}

/// Confidence tier for a pattern seen `frequency` times.
pub fn confidence_for(frequency: u32) -> f64 {
    match frequency {
        f if f >= 10 => 0.9,
        f if f >= 5 => 0.75,
        _ => 0.5,
    }
}

/// Tags attached to an insight derived from a pattern of `category`.
pub fn infer_tags(category: &str) -> Vec<String> {
    match category {
        "process" => vec!["process".into(), "workflow".into()],
        "code" => vec!["code-quality".into(), "testing".into()],
        "scope" => vec!["scope".into(), "efficiency".into()],
        other => vec![other.to_string()],
    }
}

fn insight_text(pattern: &Pattern, stats: &Stats) -> String {
    let n = pattern.frequency;
    let pct = if stats.total_runs > 0 {
        f64::from(n) / f64::from(stats.total_runs) * 100.0
    } else {
        0.0
    };

    match pattern.name.as_str() {
        "tests-skipped" => format!(
            "Tests were skipped in {pct:.0}% of runs ({n} times). Always run the test suite before declaring a task complete."
        ),
        "tests-failed" => format!(
            "Tests failed in {n} runs ({pct:.0}% of all runs). Run tests early and often; don't wait until the end."
        ),
        "lint-failed" => format!(
            "Linter issues found in {n} runs. Run the linter before committing to catch style and correctness issues early."
        ),
        "scope-creep" => format!(
            "Scope creep detected in {n} runs ({pct:.0}%). Stay focused on the specific task and resist refactoring unrelated code."
        ),
        "quick-failure" => format!(
            "Quick failures (under 60s) happened {n} times. When a task fails immediately, read the error carefully before retrying."
        ),
        "long-running" => format!(
            "Tasks ran over an hour {n} times. If a task is taking too long, step back and reconsider the approach."
        ),
        "no-test-files" => format!(
            "Source files were edited without touching tests in {n} runs. Always update or add tests when modifying source code."
        ),
        "success-with-errors" => format!(
            "Tasks were marked successful despite errors {n} times. Investigate error messages even on 'successful' runs."
        ),
        name => format!(
            "Pattern '{name}' detected {n} times ({pct:.0}%): {}",
            pattern.description
        ),
    }
}

fn overall_text(stats: &Stats) -> Option<String> {
    let pct = stats.success_rate * 100.0;
    let total = stats.total_runs;
    if stats.success_rate >= 0.8 {
        Some(format!(
            "Strong performance: {pct:.0}% success rate across {total} runs. Keep doing what works."
        ))
    } else if stats.success_rate < 0.5 {
        Some(format!(
            "Low success rate: only {pct:.0}% across {total} runs. Check the top failure patterns and address them systematically."
        ))
    } else {
        None
    }
}

/// Candidate insights for the given patterns and statistics. Ids depend only
/// on pattern name and total run count.
pub fn generate_insights(patterns: &[Pattern], stats: &Stats) -> Vec<Insight> {
    let total = stats.total_runs;
    let mut insights: Vec<Insight> = patterns
        .iter()
        .filter(|p| p.frequency >= MIN_PATTERN_FREQUENCY)
        .map(|p| Insight {
            id: format!("ins-{}-{}", p.name, total),
            text: insight_text(p, stats),
            confidence: confidence_for(p.frequency),
            based_on_runs: total,
            patterns: vec![p.name.clone()],
            tags: infer_tags(&p.category),
            cadence: ANALYSIS_CADENCE.to_string(),
            active: true,
            created_at: None,
            expires_at: None,
        })
        .collect();

    if total >= MIN_RUNS_FOR_OVERALL {
        if let Some(text) = overall_text(stats) {
            insights.push(Insight {
                id: format!("ins-overall-{}", total),
                text,
                confidence: OVERALL_CONFIDENCE,
                based_on_runs: total,
                patterns: Vec::new(),
                tags: Vec::new(),
                cadence: ANALYSIS_CADENCE.to_string(),
                active: true,
                created_at: None,
                expires_at: None,
            });
        }
    }

    insights
}
