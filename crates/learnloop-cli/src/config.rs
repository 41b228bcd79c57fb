//! CLI configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "learnloop.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Relevant runs considered by `query` when `--max` is not given.
    #[serde(default = "default_max_runs")]
    pub max_runs: usize,
    /// Rows shown by `runs` when `--last` is not given.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".learning-loop").join("loop.db")
}

fn default_max_runs() -> usize {
    10
}

fn default_list_limit() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_runs: default_max_runs(),
            list_limit: default_list_limit(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load `learnloop.toml` from the working directory, then the per-user
    /// config file, or fall back to defaults.
    pub fn load() -> Result<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                tracing::debug!(target: "learnloop::cli", "Using config {}", path.display());
                return Self::load_from(&path);
            }
        }
        Ok(Config::default())
    }

    /// Candidate config files in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("learnloop").join("config.toml"));
        }
        paths
    }

    /// Resolve the effective config: an explicit file wins over the search
    /// path, and `db` overrides whatever path the file named.
    pub fn resolve(explicit: Option<&Path>, db: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        if let Some(db) = db {
            config.db_path = db.to_path_buf();
        }
        Ok(config)
    }
}
