//! Shared logging setup for Dynamic Tables binaries.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str = "dyntables=info,dyntables_schema=info,dyntables_db=info";

/// Logging configuration shared by Dynamic Tables binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Send the full filter to stderr instead of warnings only
    pub verbose: bool,
    /// Directory for the daily-rolling log file; `None` disables file logging
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with stderr output and an optional rolling log file.
///
/// Keep the returned guard alive until exit so buffered file output is flushed.
pub fn init_logging(config: LogConfig<'_>) -> Result<Option<WorkerGuard>> {
    let filter = default_filter();

    let console_filter = if config.verbose {
        filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", sanitize_name(config.app_name)));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// `RUST_LOG` if set, otherwise [`DEFAULT_LOG_FILTER`].
pub fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("dyntables"), "dyntables");
        assert_eq!(sanitize_name("dyn tables/../x"), "dyn_tables____x");
    }

    #[test]
    fn test_init_logging_writes_file_and_rejects_second_init() {
        let tmp = tempfile::TempDir::new().unwrap();
        let guard = init_logging(LogConfig {
            app_name: "dyntables-test",
            verbose: false,
            log_dir: Some(tmp.path().join("logs")),
        })
        .unwrap();
        assert!(guard.is_some());
        assert!(tmp.path().join("logs").is_dir());

        let second = init_logging(LogConfig {
            app_name: "dyntables-test",
            verbose: false,
            log_dir: None,
        });
        assert!(second.is_err());
    }
}
