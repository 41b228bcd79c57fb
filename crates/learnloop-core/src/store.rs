//! SQLite persistence for runs, patterns, pattern matches and insights.

use crate::error::StorageContext;
use crate::repository::{Repository, RunCounts};
use crate::{LoopError, Result};
use learnloop_types::{Impact, Insight, Outcome, Pattern, Run};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const RUN_COLUMNS: &str = "id, task, outcome, duration_s, timestamp, tools_used, files_touched, \
     tests_passed, lint_passed, error_message, tags, agent, model, metadata, analyzed, created_at";

const PATTERN_COLUMNS: &str = "p.id, p.name, p.description, p.category, p.impact, \
     p.outcome_correlation, p.frequency, p.first_seen, p.last_seen, p.created_at";

const INSIGHT_COLUMNS: &str =
    "id, text, confidence, based_on_runs, patterns, tags, cadence, active, created_at, expires_at";

/// SQLite-backed [`Repository`]. One connection, serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).during("open database")?;
        conn.busy_timeout(Duration::from_secs(5))
            .during("set busy timeout")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .during("enable WAL")?;

        let store = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        };
        store.init_schema()?;
        tracing::debug!(target: "learnloop::store", "Opened database at {}", path.display());
        Ok(store)
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LoopError::LockPoisoned)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id            TEXT PRIMARY KEY,
                task          TEXT NOT NULL,
                outcome       TEXT NOT NULL CHECK (outcome IN ('success','partial','failure','error')),
                duration_s    INTEGER,
                timestamp     TEXT NOT NULL,
                tools_used    TEXT NOT NULL DEFAULT '[]',
                files_touched TEXT NOT NULL DEFAULT '[]',
                tests_passed  INTEGER,
                lint_passed   INTEGER,
                error_message TEXT,
                tags          TEXT NOT NULL DEFAULT '[]',
                agent         TEXT NOT NULL DEFAULT '',
                model         TEXT NOT NULL DEFAULT '',
                metadata      TEXT NOT NULL DEFAULT '{}',
                analyzed      INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS patterns (
                id                  TEXT PRIMARY KEY,
                name                TEXT NOT NULL UNIQUE,
                description         TEXT NOT NULL,
                category            TEXT NOT NULL,
                impact              TEXT NOT NULL,
                outcome_correlation TEXT NOT NULL DEFAULT '',
                frequency           INTEGER NOT NULL DEFAULT 0,
                first_seen          TEXT,
                last_seen           TEXT,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS pattern_matches (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id     TEXT NOT NULL REFERENCES runs(id),
                pattern_id TEXT NOT NULL REFERENCES patterns(id),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE(run_id, pattern_id)
            );

            CREATE TABLE IF NOT EXISTS insights (
                id            TEXT PRIMARY KEY,
                text          TEXT NOT NULL,
                confidence    REAL NOT NULL,
                based_on_runs INTEGER NOT NULL,
                patterns      TEXT NOT NULL DEFAULT '[]',
                tags          TEXT NOT NULL DEFAULT '[]',
                cadence       TEXT NOT NULL,
                active        INTEGER NOT NULL DEFAULT 1,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                expires_at    TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_runs_outcome ON runs(outcome);
            CREATE INDEX IF NOT EXISTS idx_runs_timestamp ON runs(timestamp);
            CREATE INDEX IF NOT EXISTS idx_runs_analyzed ON runs(analyzed);
            CREATE INDEX IF NOT EXISTS idx_pattern_matches_run ON pattern_matches(run_id);
            CREATE INDEX IF NOT EXISTS idx_pattern_matches_pattern ON pattern_matches(pattern_id);
            CREATE INDEX IF NOT EXISTS idx_insights_active ON insights(active);
            "#,
        )
        .during("create schema")?;
        Ok(())
    }

    fn query_runs(&self, sql: &str, operation: &'static str, args: impl rusqlite::Params) -> Result<Vec<Run>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).during(operation)?;
        let runs = stmt
            .query_map(args, Self::row_to_run)
            .during(operation)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .during(operation)?;
        Ok(runs)
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<Run> {
        let outcome: String = row.get("outcome")?;
        let tools_used: String = row.get("tools_used")?;
        let files_touched: String = row.get("files_touched")?;
        let tags: String = row.get("tags")?;
        let metadata: String = row.get("metadata")?;

        Ok(Run {
            id: row.get("id")?,
            task: row.get("task")?,
            outcome: parse_column::<Outcome>(2, &outcome)?,
            duration_seconds: row.get("duration_s")?,
            timestamp: row.get("timestamp")?,
            tools_used: parse_json_column(5, &tools_used)?,
            files_touched: parse_json_column(6, &files_touched)?,
            tests_passed: row.get("tests_passed")?,
            lint_passed: row.get("lint_passed")?,
            error_message: row.get("error_message")?,
            tags: parse_json_column(10, &tags)?,
            agent: row.get("agent")?,
            model: row.get("model")?,
            metadata: parse_json_column(13, &metadata)?,
            analyzed: row.get("analyzed")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_pattern(row: &rusqlite::Row) -> rusqlite::Result<Pattern> {
        let impact: String = row.get("impact")?;
        Ok(Pattern {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            category: row.get("category")?,
            impact: parse_column::<Impact>(4, &impact)?,
            outcome_correlation: row.get("outcome_correlation")?,
            frequency: row.get("frequency")?,
            first_seen: row.get("first_seen")?,
            last_seen: row.get("last_seen")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_insight(row: &rusqlite::Row) -> rusqlite::Result<Insight> {
        let patterns: String = row.get("patterns")?;
        let tags: String = row.get("tags")?;
        Ok(Insight {
            id: row.get("id")?,
            text: row.get("text")?,
            confidence: row.get("confidence")?,
            based_on_runs: row.get("based_on_runs")?,
            patterns: parse_json_column(4, &patterns)?,
            tags: parse_json_column(5, &tags)?,
            cadence: row.get("cadence")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
        })
    }
}

impl Repository for SqliteStore {
    fn insert_run(&self, run: &Run) -> Result<()> {
        let tools_used = serde_json::to_string(&run.tools_used)?;
        let files_touched = serde_json::to_string(&run.files_touched)?;
        let tags = serde_json::to_string(&run.tags)?;
        let metadata = if run.metadata.is_null() {
            "{}".to_string()
        } else {
            serde_json::to_string(&run.metadata)?
        };

        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT INTO runs (
                id, task, outcome, duration_s, timestamp, tools_used, files_touched,
                tests_passed, lint_passed, error_message, tags, agent, model, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                run.id,
                run.task,
                run.outcome.as_str(),
                run.duration_seconds,
                run.timestamp,
                tools_used,
                files_touched,
                run.tests_passed,
                run.lint_passed,
                run.error_message,
                tags,
                run.agent,
                run.model,
                metadata,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(LoopError::DuplicateRun(run.id.clone())),
            Err(source) => Err(LoopError::Storage {
                operation: "insert run",
                source,
            }),
        }
    }

    fn get_run(&self, id: &str) -> Result<Run> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
            params![id],
            Self::row_to_run,
        )
        .optional()
        .during("get run")?
        .ok_or_else(|| LoopError::RunNotFound(id.to_string()))
    }

    fn list_runs(&self, limit: usize, outcome: Option<Outcome>) -> Result<Vec<Run>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = if limit == 0 { -1 } else { limit as i64 };
        self.query_runs(
            &format!(
                "SELECT {RUN_COLUMNS} FROM runs \
                 WHERE (?1 IS NULL OR outcome = ?1) \
                 ORDER BY timestamp DESC, id ASC LIMIT ?2"
            ),
            "list runs",
            params![outcome.map(|o| o.as_str()), limit],
        )
    }

    fn run_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM runs WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .during("check run exists")
    }

    fn count_runs(&self) -> Result<RunCounts> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(outcome = 'success'), 0),
                COALESCE(SUM(outcome = 'failure'), 0)
            FROM runs
            "#,
            [],
            |row| {
                Ok(RunCounts {
                    total: row.get(0)?,
                    success: row.get(1)?,
                    failure: row.get(2)?,
                })
            },
        )
        .during("count runs")
    }

    fn unanalyzed_runs(&self) -> Result<Vec<Run>> {
        self.query_runs(
            &format!(
                "SELECT {RUN_COLUMNS} FROM runs WHERE analyzed = 0 ORDER BY timestamp ASC, id ASC"
            ),
            "get unanalyzed runs",
            [],
        )
    }

    fn mark_runs_analyzed(&self, ids: &[String]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().during("mark runs analyzed")?;
        {
            let mut stmt = tx
                .prepare("UPDATE runs SET analyzed = 1 WHERE id = ?1")
                .during("mark runs analyzed")?;
            for id in ids {
                stmt.execute(params![id]).during("mark runs analyzed")?;
            }
        }
        tx.commit().during("mark runs analyzed")?;
        Ok(())
    }

    fn upsert_pattern(&self, pattern: &Pattern) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO patterns (
                id, name, description, category, impact, outcome_correlation,
                frequency, first_seen, last_seen
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(name) DO UPDATE SET
                frequency = frequency + excluded.frequency,
                last_seen = excluded.last_seen,
                description = excluded.description
            "#,
            params![
                pattern.id,
                pattern.name,
                pattern.description,
                pattern.category,
                pattern.impact.as_str(),
                pattern.outcome_correlation,
                pattern.frequency,
                pattern.first_seen,
                pattern.last_seen,
            ],
        )
        .during("upsert pattern")?;
        Ok(())
    }

    fn get_pattern_by_name(&self, name: &str) -> Result<Pattern> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {PATTERN_COLUMNS} FROM patterns p WHERE p.name = ?1"),
            params![name],
            Self::row_to_pattern,
        )
        .optional()
        .during("get pattern")?
        .ok_or_else(|| LoopError::PatternNotFound(name.to_string()))
    }

    fn list_patterns(&self) -> Result<Vec<Pattern>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PATTERN_COLUMNS} FROM patterns p ORDER BY p.frequency DESC, p.name ASC"
            ))
            .during("list patterns")?;
        let patterns = stmt
            .query_map([], Self::row_to_pattern)
            .during("list patterns")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .during("list patterns")?;
        Ok(patterns)
    }

    fn add_pattern_match(&self, run_id: &str, pattern_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO pattern_matches (run_id, pattern_id) VALUES (?1, ?2)",
            params![run_id, pattern_id],
        )
        .during("add pattern match")?;
        Ok(())
    }

    fn patterns_for_run(&self, run_id: &str) -> Result<Vec<Pattern>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                r#"
                SELECT {PATTERN_COLUMNS}
                FROM patterns p
                JOIN pattern_matches pm ON pm.pattern_id = p.id
                WHERE pm.run_id = ?1
                ORDER BY p.frequency DESC, p.name ASC
                "#
            ))
            .during("get patterns for run")?;
        let patterns = stmt
            .query_map(params![run_id], Self::row_to_pattern)
            .during("get patterns for run")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .during("get patterns for run")?;
        Ok(patterns)
    }

    fn insert_insight(&self, insight: &Insight) -> Result<()> {
        let patterns = serde_json::to_string(&insight.patterns)?;
        let tags = serde_json::to_string(&insight.tags)?;

        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT INTO insights (
                id, text, confidence, based_on_runs, patterns, tags, cadence, active, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                insight.id,
                insight.text,
                insight.confidence,
                insight.based_on_runs,
                patterns,
                tags,
                insight.cadence,
                insight.active,
                insight.expires_at,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(LoopError::DuplicateInsight(insight.id.clone()))
            }
            Err(source) => Err(LoopError::Storage {
                operation: "insert insight",
                source,
            }),
        }
    }

    fn list_insights(&self, active_only: bool, tags: &[String]) -> Result<Vec<Insight>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {INSIGHT_COLUMNS} FROM insights \
                 WHERE (?1 = 0 OR active = 1) \
                 ORDER BY confidence DESC, created_at DESC, id ASC"
            ))
            .during("list insights")?;
        let insights = stmt
            .query_map(params![active_only], Self::row_to_insight)
            .during("list insights")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .during("list insights")?;

        // Tags live in a JSON array column, so the any-of filter runs here.
        if tags.is_empty() {
            return Ok(insights);
        }
        Ok(insights.into_iter().filter(|i| i.has_any_tag(tags)).collect())
    }

    fn deactivate_insight(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE insights SET active = 0 WHERE id = ?1 AND active = 1",
                params![id],
            )
            .during("deactivate insight")?;
        Ok(changed > 0)
    }

    fn count_insights(&self) -> Result<u32> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM insights WHERE active = 1", [], |row| row.get(0))
            .during("count insights")
    }
}

/// Primary-key or UNIQUE constraint failure.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json_column<T: DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
