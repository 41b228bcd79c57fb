//! learnloop - learn from agent runs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use learnloop_cli::commands::{self, QueryFormat};
use learnloop_cli::config::Config;
use learnloop_cli::logging::{self, LogConfig, LogFormat};
use learnloop_types::Outcome;
use std::path::PathBuf;

/// Record agent runs, detect recurring patterns, and surface what history
/// says about the next task.
#[derive(Parser, Debug)]
#[command(name = "learnloop")]
#[command(about = "Your agents get smarter with every run")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Database path (default: .learning-loop/loop.db)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging (INFO level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long, global = true)]
    trace: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "detect=debug").
    /// Can be specified multiple times. Targets are prefixed with "learnloop::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new learning loop database
    Init,

    /// Ingest a run record (file, or - for stdin)
    Ingest {
        #[arg(value_name = "FILE")]
        source: String,
    },

    /// Get learnings relevant to a task
    Query {
        /// Task description
        text: String,

        /// Maximum relevant runs to consider
        #[arg(long, value_name = "N")]
        max: Option<usize>,

        /// Output as JSON
        #[arg(long, conflicts_with = "inject")]
        json: bool,

        /// Output as injectable markdown context
        #[arg(long)]
        inject: bool,
    },

    /// Extract patterns and insights from new runs
    Analyze {
        #[arg(long)]
        json: bool,
    },

    /// Runs, patterns and insights at a glance
    #[command(visible_alias = "report")]
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List detected patterns with stats
    Patterns {
        #[arg(long)]
        json: bool,
    },

    /// Show active insights
    Insights {
        /// Only insights carrying any of these tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Deactivate an insight so it is no longer surfaced
    Deactivate {
        #[arg(value_name = "INSIGHT_ID")]
        id: String,
    },

    /// List recent runs with outcomes
    Runs {
        /// Number of runs to show (0 for all)
        #[arg(long, value_name = "N")]
        last: Option<usize>,

        /// Only runs with this outcome (success|partial|failure|error)
        #[arg(long)]
        outcome: Option<Outcome>,

        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::Ingest { .. } => "ingest",
            Command::Query { .. } => "query",
            Command::Analyze { .. } => "analyze",
            Command::Status { .. } => "status",
            Command::Patterns { .. } => "patterns",
            Command::Insights { .. } => "insights",
            Command::Deactivate { .. } => "deactivate",
            Command::Runs { .. } => "runs",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let config = Config::resolve(cli.config.as_deref(), cli.db.as_deref())?;
    let store = commands::open_store(&config.db_path)?;

    let _span = tracing::info_span!(target: "learnloop::cli", "command", name = cli.command.name())
        .entered();
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Init => commands::init(&store, &mut out),
        Command::Ingest { source } => commands::ingest(&store, &source, &mut out),
        Command::Query {
            text,
            max,
            json,
            inject,
        } => {
            let format = if json {
                QueryFormat::Json
            } else if inject {
                QueryFormat::Inject
            } else {
                QueryFormat::Human
            };
            let max = max.unwrap_or(config.max_runs);
            commands::query(&store, &text, max, format, &mut out)
        }
        Command::Analyze { json } => commands::analyze(&store, json, &mut out),
        Command::Status { json } => commands::status(&store, json, &mut out),
        Command::Patterns { json } => commands::patterns(&store, json, &mut out),
        Command::Insights { tags, json } => commands::insights(&store, &tags, json, &mut out),
        Command::Deactivate { id } => commands::deactivate(&store, &id, &mut out),
        Command::Runs {
            last,
            outcome,
            json,
        } => {
            let last = last.unwrap_or(config.list_limit);
            commands::runs(&store, last, outcome, json, &mut out)
        }
    }
}
