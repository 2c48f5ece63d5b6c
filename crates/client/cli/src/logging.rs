//! Logging setup: stderr always, plus an optional log file.
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE: &str = "leveling.log";

/// Install the global subscriber.
///
/// The file layer is enabled when `LEVELING_LOG_DIR` is set or `to_file` is
/// requested. Keep the returned guard alive until exit so buffered lines are
/// flushed.
pub fn setup_logging(to_file: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let log_dir = std::env::var_os("LEVELING_LOG_DIR")
        .map(PathBuf::from)
        .or_else(|| to_file.then(default_log_dir));

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing::debug!("Log file: {}", log_dir.join(LOG_FILE).display());
    Ok(Some(guard))
}

/// Platform cache directory for logs.
///
/// - macOS: `~/Library/Caches/leveling/logs`
/// - Linux: `~/.cache/leveling/logs` (or `$XDG_CACHE_HOME/leveling/logs`)
/// - Windows: `%LOCALAPPDATA%\leveling\logs`
fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "leveling")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/leveling"))
        .join("logs")
}
