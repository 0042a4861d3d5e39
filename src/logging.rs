//! Logging setup for the adaptive brightness daemon.
//!
//! Structured JSON logs go to stderr and to a daily-rotated file under
//! the user's data directory (`~/.local/share/adaptive-brightness` on Linux).
//! Silent mode installs no subscriber at all, so every event is dropped.

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log directory name under the data directory
const LOG_DIR_NAME: &str = "adaptive-brightness";
/// Log file prefix
const LOG_FILE_PREFIX: &str = "daemon";
/// Maximum number of log files to retain
const MAX_LOG_FILES: usize = 3;

/// Errors related to logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Could not determine the user data directory")]
    DataDirectoryNotFound,

    #[error("Failed to create log directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file appender: {0}")]
    AppenderCreationFailed(String),
}

/// Guard that keeps the non-blocking writers alive.
/// Must be held for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    _stderr_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize JSON logging to stderr and the rotating file.
///
/// With `silent` nothing is logged anywhere and no log directory or file
/// is created. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(silent: bool) -> Result<LogGuard, LoggingError> {
    if silent {
        return Ok(LogGuard {
            _file_guard: None,
            _stderr_guard: None,
        });
    }

    let log_dir = log_directory()?;

    std::fs::create_dir_all(&log_dir).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: log_dir.display().to_string(),
        source: e,
    })?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| LoggingError::AppenderCreationFailed(e.to_string()))?;

    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking_file);

    let (non_blocking_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let stderr_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_current_span(true)
        .with_writer(non_blocking_stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LogGuard {
        _file_guard: Some(file_guard),
        _stderr_guard: Some(stderr_guard),
    })
}

/// Directory holding the rotated log files.
pub fn log_directory() -> Result<PathBuf, LoggingError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(LOG_DIR_NAME))
        .ok_or(LoggingError::DataDirectoryNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory() {
        if let Ok(dir) = log_directory() {
            assert!(dir.ends_with(LOG_DIR_NAME));
        }
    }

    #[test]
    fn test_silent_mode_opens_no_writers() {
        let guard = init_logging(true).unwrap();
        assert!(guard._file_guard.is_none());
        assert!(guard._stderr_guard.is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = LoggingError::DirectoryCreationFailed {
            path: "/nope".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/nope"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
