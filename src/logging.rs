//! File-based logging for harmony-player
//!
//! The console driver reads commands from stdin and prints snapshots to
//! stdout, so tracing output goes to a file instead.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_PREFIX: &str = "harmony-player";
const DEFAULT_FILTER: &str = "harmony_player=debug,warn";

/// Initialize the logging system.
///
/// Logs are written to `<log_dir>/harmony-player.YYYY-MM-DD.log` with daily
/// rotation. `RUST_LOG` overrides the default filter. Keep the returned guard
/// alive until exit so buffered lines are flushed.
pub fn init_logging(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    // Ensure log directory exists
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    // Writes go through a worker thread so the session task never blocks on disk
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the built-in filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // Plain text in files
        .with_target(true) // Module path, e.g. harmony_player::controller
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/", log_dir.display());

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_creates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let log_dir = root.path().join("nested").join(".logs");

        let guard = init_logging(&log_dir).unwrap();
        tracing::info!("written after init");
        drop(guard);

        assert!(log_dir.is_dir());
        assert!(std::fs::read_dir(&log_dir).unwrap().next().is_some());
    }
}
