//! Logging configuration for `trustsync`

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{
    self,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

use crate::Result;
use crate::TrustSyncError;

const LOG_FILE_PREFIX: &str = "trustsync.log";

/// Filter directives for a crate log level; third-party noise stays at warn
#[must_use]
pub fn filter_directives(level: &str) -> String {
    format!("warn,trustsync={level},sqlx=error,hyper=warn,tower=warn,tungstenite=warn")
}

/// Initialize logging: stdout (info+), stderr (errors) and a daily file.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the lifetime of the process.
///
/// # Errors
/// Returns error if the log directory cannot be created or a subscriber is
/// already installed
pub fn init_logging(level: &str, directory: &str) -> Result<WorkerGuard> {
    let logs_dir = Path::new(directory);
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let env_filter = EnvFilter::try_new(filter_directives(level))
        .map_err(|e| TrustSyncError::Config(format!("invalid log level {level:?}: {e}")))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // stdout layer: info, debug, warn levels (INFO for access logs)
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stdout)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

    // stderr layer: only errors
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TrustSyncError::Custom(format!("logging already initialized: {e}")))?;

    tracing::debug!(
        "Logging initialized with level: {} - files under {}/{}.YYYY-MM-DD",
        level,
        directory,
        LOG_FILE_PREFIX
    );

    Ok(guard)
}
