//! Logging setup
//!
//! Console output through `tracing-subscriber`, filtered by `RUST_LOG` or the
//! configured level, plus an optional log file rotated daily at midnight.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Logging setup errors
#[derive(Error, Debug)]
pub enum LoggerError {
    /// Unparseable level or filter directive
    #[error("Invalid log filter '{0}'")]
    Filter(String),

    /// Log directory could not be created
    #[error("Cannot create log directory {path}: {source}")]
    Directory {
        /// Directory that failed
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// A global subscriber is already installed
    #[error("Logger already initialised")]
    AlreadyInitialised,
}

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Default filter when `RUST_LOG` is unset (`info`, `ledwatch=debug`, ...)
    pub level: String,
    /// Directory for the rotating log file; console only when `None`
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_prefix: String,
    /// Emit the file log as JSON lines
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "ledwatch.log".to_string(),
            json: false,
        }
    }
}

impl LogOptions {
    /// Options with a default level
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Also log to a daily file under `directory`
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn filter(level: &str) -> Result<EnvFilter, LoggerError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|_| LoggerError::Filter(level.to_string())),
    }
}

fn file_writer(
    directory: &Path,
    prefix: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggerError> {
    std::fs::create_dir_all(directory).map_err(|source| LoggerError::Directory {
        path: directory.to_path_buf(),
        source,
    })?;
    let appender = tracing_appender::rolling::daily(directory, prefix);
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber
///
/// Keep the returned guard alive until exit; dropping it flushes the file.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>, LoggerError> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter(&options.level)?);

    let (file, guard) = match &options.directory {
        Some(dir) => {
            let (writer, guard) = file_writer(dir, &options.file_prefix)?;
            let layer = if options.json {
                fmt::layer().json().with_writer(writer).with_filter(filter(&options.level)?).boxed()
            } else {
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(filter(&options.level)?)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialised)?;

    tracing::debug!("Logging initialised at '{}'", options.level);
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let opts = LogOptions::new("debug").with_directory("/tmp/ledwatch-logs");
        assert_eq!(opts.level, "debug");
        assert_eq!(opts.directory.as_deref(), Some(Path::new("/tmp/ledwatch-logs")));
        assert_eq!(LogOptions::default().file_prefix, "ledwatch.log");
    }

    #[test]
    fn test_filter_parses_directives() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(filter("ledwatch=debug,info").is_ok());
            assert!(matches!(filter("ledwatch=verbose"), Err(LoggerError::Filter(_))));
        }
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("daily");
        let (_writer, _guard) = file_writer(&nested, "test.log").unwrap();
        assert!(nested.is_dir());
    }
}
