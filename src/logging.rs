//! Logging setup: ANSI stdout plus a daily rolling file under `LOGS_PATH`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::AppError;

const DEFAULT_FILTER: &str = "daily_reminder_bot=info";
const LOG_FILE_PREFIX: &str = "daily-reminder-bot";
const KEPT_LOG_FILES: usize = 7;

fn rolling_appender(logs_path: &Path) -> Result<RollingFileAppender, AppError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(KEPT_LOG_FILES)
        .build(logs_path)
        .map_err(|e| {
            AppError::config(format!(
                "Failed to open log directory '{}': {e}",
                logs_path.to_string_lossy()
            ))
        })
}

/// Installs the global subscriber. `log` records are bridged into it.
///
/// The returned guard flushes the file writer on drop, so the caller keeps it
/// alive until shutdown.
#[must_use = "dropping the guard stops file logging"]
pub fn setup_logging(config: &Config) -> Result<WorkerGuard, AppError> {
    let (file_writer, guard) = tracing_appender::non_blocking(rolling_appender(&config.logs_path)?);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::config(format!("Failed to install log subscriber: {e}")))?;

    Ok(guard)
}
