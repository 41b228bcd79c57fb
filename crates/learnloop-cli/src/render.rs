//! Plain-text, markdown and JSON rendering of command results.
//!
//! Every renderer writes to an arbitrary [`Write`] so commands can target
//! stdout while tests capture into a buffer.

use learnloop_core::{QueryResult, Report, SynthesisReport};
use learnloop_types::{Impact, Insight, Outcome, Pattern, Run};
use serde::Serialize;
use std::io::{self, Write};

/// Task text in run listings is cut to this many characters.
pub const TASK_WIDTH: usize = 50;

/// Shorten `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

fn impact_label(impact: Impact) -> String {
    impact.as_str().to_uppercase()
}

fn outcome_symbol(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "✓",
        Outcome::Failure => "✗",
        Outcome::Partial => "◐",
        Outcome::Error => "!",
    }
}

/// Pretty-printed JSON followed by a newline.
pub fn json<T: Serialize + ?Sized>(w: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)
}

pub fn query_human(w: &mut impl Write, result: &QueryResult) -> io::Result<()> {
    writeln!(w)?;
    if result.is_empty() {
        writeln!(w, "  No relevant learnings found for: {:?}", result.query)?;
        writeln!(w, "  Ingest more runs with: learnloop ingest <file>")?;
        return writeln!(w);
    }

    write!(w, " LEARNINGS  From {}", result.matched_runs)?;
    if result.matched_runs != result.total_runs {
        write!(w, "/{}", result.total_runs)?;
    }
    write!(w, " runs")?;
    if result.matched_runs > 0 {
        write!(w, " ({} success)", percent(result.success_rate))?;
    }
    writeln!(w)?;
    writeln!(w)?;

    if !result.insights.is_empty() {
        for (i, insight) in result.insights.iter().enumerate() {
            writeln!(w, "  {}. {}", i + 1, insight.text)?;
        }
        writeln!(w)?;
    }

    if !result.top_patterns.is_empty() {
        writeln!(w, " WATCH OUT  Patterns that caused failures")?;
        writeln!(w)?;
        for p in &result.top_patterns {
            writeln!(
                w,
                "  ● {:<24} {:>2} occurrences   {} impact",
                p.name,
                p.count,
                impact_label(p.impact)
            )?;
        }
        writeln!(w)?;
    }

    if !result.success_signals.is_empty() {
        writeln!(w, " SUCCESS SIGNALS  What winning runs looked like")?;
        writeln!(w)?;
        for signal in &result.success_signals {
            writeln!(w, "  ✓ {}", signal)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Markdown block meant to be pasted into an agent's context.
pub fn query_inject(w: &mut impl Write, result: &QueryResult) -> io::Result<()> {
    writeln!(w, "## Learnings for: {:?}", result.query)?;
    writeln!(w)?;

    if result.is_empty() {
        return writeln!(w, "No relevant learnings found yet.");
    }

    if result.matched_runs > 0 {
        writeln!(
            w,
            "**From {} similar runs ({} success rate):**",
            result.matched_runs,
            percent(result.success_rate)
        )?;
        writeln!(w)?;
    }

    for (i, insight) in result.insights.iter().enumerate() {
        writeln!(w, "{}. {}", i + 1, insight.text)?;
        writeln!(w)?;
    }

    if !result.top_patterns.is_empty() {
        writeln!(w, "**Common failure patterns in similar tasks:**")?;
        for p in &result.top_patterns {
            writeln!(w, "- {} ({} occurrences, {} impact)", p.name, p.count, p.impact)?;
        }
        writeln!(w)?;
    }

    if !result.success_signals.is_empty() {
        writeln!(w, "**Success patterns:**")?;
        for signal in &result.success_signals {
            writeln!(w, "- {}", signal)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

pub fn report_human(w: &mut impl Write, report: &Report) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "  Learning Loop Report")?;
    writeln!(w, "  ─────────────────────")?;
    writeln!(w)?;

    write!(w, "  Runs: {} total", report.total_runs)?;
    if report.total_runs > 0 {
        write!(
            w,
            " ({} success, {} failure, {} other)",
            report.success_runs,
            report.failure_runs,
            report.other_runs()
        )?;
    }
    writeln!(w)?;
    writeln!(w, "  Rate: {} success", percent(report.success_rate))?;
    writeln!(w)?;

    let seen: Vec<&Pattern> = report.patterns.iter().filter(|p| p.frequency > 0).collect();
    if !seen.is_empty() {
        writeln!(w, "  Patterns Detected")?;
        for p in seen {
            writeln!(w, "    ● {:<24} {:>3}x   {}", p.name, p.frequency, impact_label(p.impact))?;
        }
        writeln!(w)?;
    }

    if !report.insights.is_empty() {
        writeln!(w, "  Active Insights")?;
        for (i, insight) in report.insights.iter().enumerate() {
            writeln!(
                w,
                "    {}. {} ({} confidence)",
                i + 1,
                insight.text,
                percent(insight.confidence)
            )?;
        }
        writeln!(w)?;
    }

    if report.total_runs == 0 {
        writeln!(w, "  No data yet. Start with: learnloop ingest <file>")?;
        writeln!(w)?;
    }
    Ok(())
}

pub fn synthesis_human(w: &mut impl Write, report: &SynthesisReport) -> io::Result<()> {
    writeln!(w)?;
    if report.runs_analyzed == 0 {
        writeln!(w, "  No new runs to analyze.")?;
    } else {
        writeln!(w, "  Analyzed {} new runs", report.runs_analyzed)?;
    }

    if !report.patterns_found.is_empty() {
        let names: Vec<String> = report
            .patterns_found
            .iter()
            .map(|p| format!("{} ({}x)", p.name, p.count))
            .collect();
        writeln!(w, "  Patterns: {}", names.join(", "))?;
    }

    if !report.insights_created.is_empty() {
        writeln!(w, "  Insights: {} new", report.insights_created.len())?;
    }

    if report.stats.total_runs > 0 {
        writeln!(
            w,
            "  Overall:  {} success across {} runs",
            percent(report.stats.success_rate),
            report.stats.total_runs
        )?;
    }
    writeln!(w)
}

pub fn patterns_human(w: &mut impl Write, patterns: &[Pattern]) -> io::Result<()> {
    writeln!(w)?;
    if patterns.is_empty() {
        writeln!(w, "  No patterns detected yet. Ingest some runs first.")?;
        return writeln!(w);
    }

    writeln!(w, "  Detected Patterns")?;
    writeln!(w, "  ─────────────────")?;
    writeln!(w)?;
    for p in patterns.iter().filter(|p| p.frequency > 0) {
        writeln!(
            w,
            "  ● {:<24} {:>3}x   {:<6}  {}",
            p.name,
            p.frequency,
            impact_label(p.impact),
            p.description
        )?;
    }
    writeln!(w)
}

pub fn insights_human(w: &mut impl Write, insights: &[Insight]) -> io::Result<()> {
    writeln!(w)?;
    if insights.is_empty() {
        writeln!(w, "  No insights yet. Run: learnloop analyze")?;
        return writeln!(w);
    }

    writeln!(w, "  Active Insights")?;
    writeln!(w, "  ───────────────")?;
    writeln!(w)?;
    for (i, insight) in insights.iter().enumerate() {
        writeln!(w, "  {}. {} ({})", i + 1, insight.text, percent(insight.confidence))?;
        writeln!(w, "     id: {}", insight.id)?;
        if !insight.tags.is_empty() {
            writeln!(w, "     tags: {}", insight.tags.join(", "))?;
        }
        if i < insights.len() - 1 {
            writeln!(w)?;
        }
    }
    writeln!(w)
}

pub fn runs_human(w: &mut impl Write, runs: &[Run]) -> io::Result<()> {
    writeln!(w)?;
    if runs.is_empty() {
        writeln!(w, "  No runs yet. Start with: learnloop ingest <file>")?;
        return writeln!(w);
    }

    writeln!(w, "  Recent Runs")?;
    writeln!(w, "  ───────────")?;
    writeln!(w)?;
    for run in runs {
        let duration = match run.duration_seconds {
            Some(d) => format!("{:>4}s", d),
            None => "  ---".to_string(),
        };
        writeln!(
            w,
            "  {} {:<12} {:<8} {}  {}",
            outcome_symbol(run.outcome),
            run.id,
            run.outcome,
            duration,
            truncate(&run.task, TASK_WIDTH)
        )?;
    }
    writeln!(w)
}

pub fn ingest_human(w: &mut impl Write, run: &Run, patterns: &[String]) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "  Ingested {} [{}]", run.id, run.outcome)?;
    if !patterns.is_empty() {
        writeln!(w, "  Patterns: {}", patterns.join(", "))?;
    }
    writeln!(w)
}
