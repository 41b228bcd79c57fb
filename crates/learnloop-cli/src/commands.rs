//! Command handlers. Each one runs against a repository and writes its
//! output to the given writer.

use crate::render;
use anyhow::{Context, Result};
use learnloop_core::{Ingester, QueryEngine, Report, Repository, SqliteStore, Synthesizer};
use learnloop_types::Outcome;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// How `query` presents its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryFormat {
    #[default]
    Human,
    Json,
    /// Markdown suitable for pasting into an agent's context.
    Inject,
}

/// Open (creating if needed) the store at `path`.
pub fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

pub fn init(store: &SqliteStore, out: &mut impl Write) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "  Learning Loop initialized")?;
    writeln!(out, "  Database: {}", store.path().display())?;
    writeln!(out)?;
    writeln!(out, "  Next steps:")?;
    writeln!(out, "    learnloop ingest <run.json>     Record your first agent run")?;
    writeln!(out, "    learnloop query \"fix auth bug\"   Get learnings for a task")?;
    writeln!(out)?;
    Ok(())
}

/// Ingest one run record from `source`, a file path or `-` for stdin.
pub fn ingest(repo: &dyn Repository, source: &str, out: &mut impl Write) -> Result<()> {
    let ingester = Ingester::new(repo);
    let (run, patterns) = if source == "-" {
        ingester.ingest_reader(io::stdin().lock())?
    } else {
        let file = File::open(source).with_context(|| format!("Failed to open {}", source))?;
        ingester.ingest_reader(file)?
    };
    render::ingest_human(out, &run, &patterns)?;
    Ok(())
}

pub fn query(
    repo: &dyn Repository,
    text: &str,
    max_runs: usize,
    format: QueryFormat,
    out: &mut impl Write,
) -> Result<()> {
    let result = QueryEngine::new(repo).query(text, max_runs)?;
    match format {
        QueryFormat::Human => render::query_human(out, &result)?,
        QueryFormat::Json => render::json(out, &result)?,
        QueryFormat::Inject => render::query_inject(out, &result)?,
    }
    Ok(())
}

pub fn analyze(repo: &dyn Repository, json: bool, out: &mut impl Write) -> Result<()> {
    let report = Synthesizer::new(repo).synthesize()?;
    if json {
        render::json(out, &report)?;
    } else {
        render::synthesis_human(out, &report)?;
    }
    Ok(())
}

pub fn status(repo: &dyn Repository, json: bool, out: &mut impl Write) -> Result<()> {
    let report = Report::generate(repo)?;
    if json {
        render::json(out, &report)?;
    } else {
        render::report_human(out, &report)?;
    }
    Ok(())
}

pub fn patterns(repo: &dyn Repository, json: bool, out: &mut impl Write) -> Result<()> {
    let patterns = repo.list_patterns()?;
    if json {
        render::json(out, &patterns)?;
    } else {
        render::patterns_human(out, &patterns)?;
    }
    Ok(())
}

pub fn insights(
    repo: &dyn Repository,
    tags: &[String],
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let insights = repo.list_insights(true, tags)?;
    if json {
        render::json(out, &insights)?;
    } else {
        render::insights_human(out, &insights)?;
    }
    Ok(())
}

pub fn deactivate(repo: &dyn Repository, id: &str, out: &mut impl Write) -> Result<()> {
    if repo.deactivate_insight(id)? {
        writeln!(out, "Deactivated insight {}", id)?;
    } else {
        writeln!(out, "No insight with id {}", id)?;
    }
    Ok(())
}

/// List the newest `last` runs (0 for all), optionally of one outcome.
pub fn runs(
    repo: &dyn Repository,
    last: usize,
    outcome: Option<Outcome>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let runs = repo.list_runs(last, outcome)?;
    if json {
        render::json(out, &runs)?;
    } else {
        render::runs_human(out, &runs)?;
    }
    Ok(())
}
