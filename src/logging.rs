//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Two modes:
//! - **File** ([`init_with_file`]): JSON file layer (daily rotation) + console layer
//! - **Console** ([`init_console`]): stderr only
//!
//! Both honour `RUST_LOG`; the configured level is the fallback.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for rotated log files.
const LOG_FILE_PREFIX: &str = "whatsapp-gateway.log";

/// Holds the non-blocking writer guard for file logging.
///
/// The [`WorkerGuard`] must be kept alive for the duration of the process.
/// Dropping it flushes pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialise logging with a rotated JSON file plus human-readable stderr.
///
/// Writes to `{logs_dir}/whatsapp-gateway.log.YYYY-MM-DD`.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init_with_file(logs_dir: &Path, default_level: &str) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        )
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(LoggingGuard {
        _guard: Some(guard),
    })
}

/// Initialise human-readable logging to stderr only.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_console(default_level: &str) -> anyhow::Result<LoggingGuard> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    Ok(LoggingGuard { _guard: None })
}

/// Pick the mode from an optional log directory.
///
/// # Errors
///
/// See [`init_with_file`] and [`init_console`].
pub fn init(logs_dir: Option<&Path>, default_level: &str) -> anyhow::Result<LoggingGuard> {
    match logs_dir {
        Some(dir) => init_with_file(dir, default_level),
        None => init_console(default_level),
    }
}
