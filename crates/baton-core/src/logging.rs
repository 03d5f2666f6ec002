//! Logging configuration using tracing
//!
//! Script output owns stdout, so logs only ever go to a daily rolling file.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

pub const LOG_FILE_PREFIX: &str = "baton.log";

const DEFAULT_FILTER: &str = "baton=info,baton_nav=info,warn";

/// Initialize the logging subsystem
///
/// Logs go to `log_dir` when given, otherwise to the platform data
/// directory (`~/.local/share/baton/logs/` on Linux). The level is taken
/// from `BATON_LOG`.
///
/// Returns the directory the log files are written to.
///
/// # Examples
/// ```bash
/// BATON_LOG=debug baton run script.toml
/// BATON_LOG=baton_nav=trace baton run script.toml --config .
/// ```
pub fn init(log_dir: Option<&Path>) -> Result<PathBuf> {
    let log_dir = log_dir.map_or_else(default_log_directory, Path::to_path_buf);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let env_filter =
        EnvFilter::try_from_env("BATON_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::config(format!("Logging already initialized: {}", e)))?;

    tracing::debug!("Logging to {}", log_dir.display());
    Ok(log_dir)
}

/// Per-user log directory used when no explicit one is given
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("baton")
        .join("logs")
}
