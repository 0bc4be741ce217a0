//! Configuration for the dyntables CLI
//!
//! Everything lives under `~/.dyntables/` unless `DYNTABLES_HOME` says
//! otherwise. An optional `config.toml` there can point at a different
//! database file.

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Overrides the home directory.
pub const HOME_ENV: &str = "DYNTABLES_HOME";
/// Overrides the database path (below `--db`).
pub const DB_ENV: &str = "DYNTABLES_DB";

const DEFAULT_DB_FILE: &str = "tables.sqlite";
const CONFIG_FILE: &str = "config.toml";

/// Home directory: `$DYNTABLES_HOME`, else `~/.dyntables`.
pub fn dyntables_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    user_home().join(".dyntables")
}

fn user_home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Path of the optional config file.
pub fn config_path() -> PathBuf {
    dyntables_home().join(CONFIG_FILE)
}

/// Get logs directory: ~/.dyntables/logs
pub fn logs_dir() -> PathBuf {
    dyntables_home().join("logs")
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    /// Database file; relative paths are taken from the home directory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Write a daily log file under `<home>/logs`
    pub file: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { file: true }
    }
}

impl Config {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Invalid config.toml")
    }

    /// Load `config.toml` from `home`; a missing file yields the defaults.
    pub fn load_from(home: &Path) -> anyhow::Result<Self> {
        let path = home.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                Self::parse(&text).with_context(|| format!("Failed to load {}", path.display()))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&dyntables_home())
    }
}

/// Where the database path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbPathSource {
    Flag,
    Env,
    ConfigFile,
    Default,
}

impl DbPathSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbPathSource::Flag => "--db",
            DbPathSource::Env => DB_ENV,
            DbPathSource::ConfigFile => "config.toml",
            DbPathSource::Default => "default",
        }
    }
}

/// Resolve the database path.
///
/// Priority:
/// 1. `--db` flag
/// 2. `DYNTABLES_DB`
/// 3. `database.path` in config.toml
/// 4. `<home>/tables.sqlite`
pub fn resolve_db_path_from(
    flag: Option<&Path>,
    env: Option<PathBuf>,
    home: &Path,
    config: &Config,
) -> (PathBuf, DbPathSource) {
    if let Some(path) = flag {
        return (path.to_path_buf(), DbPathSource::Flag);
    }
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        return (path, DbPathSource::Env);
    }
    if let Some(path) = &config.database.path {
        let path = if path.is_relative() {
            home.join(path)
        } else {
            path.clone()
        };
        return (path, DbPathSource::ConfigFile);
    }
    (home.join(DEFAULT_DB_FILE), DbPathSource::Default)
}

/// [`resolve_db_path_from`] against the process environment.
pub fn resolve_db_path(flag: Option<&Path>, config: &Config) -> (PathBuf, DbPathSource) {
    resolve_db_path_from(
        flag,
        std::env::var_os(DB_ENV).map(PathBuf::from),
        &dyntables_home(),
        config,
    )
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ConfigArgs, db_flag: Option<&Path>) -> anyhow::Result<()> {
    let home = dyntables_home();
    let config_file = config_path();
    let config = Config::load()?;
    let (db_path, source) = resolve_db_path(db_flag, &config);
    let logs = logs_dir();

    if args.json {
        let out = serde_json::json!({
            "home": home.to_string_lossy(),
            "config_file": {
                "path": config_file.to_string_lossy(),
                "exists": config_file.exists(),
            },
            "database": {
                "path": db_path.to_string_lossy(),
                "source": source.as_str(),
                "exists": db_path.exists(),
                "max_connections": config.database.max_connections,
            },
            "logs": {
                "path": logs.to_string_lossy(),
                "enabled": config.logging.file,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("DYNTABLES CONFIGURATION");
        println!("=======================");
        println!();
        println!("Home:      {}", home.display());
        println!(
            "Config:    {} {}",
            config_file.display(),
            if config_file.exists() { "" } else { "(not present)" }
        );
        println!(
            "Database:  {} (from {}{})",
            db_path.display(),
            source.as_str(),
            if db_path.exists() { "" } else { ", not yet created" }
        );
        println!("Pool size: {}", config.database.max_connections);
        println!(
            "Logs:      {}{}",
            logs.display(),
            if config.logging.file { "" } else { " (disabled)" }
        );
    }

    Ok(())
}
