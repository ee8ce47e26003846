//! Tracing subscriber setup.
//!
//! Output goes to stderr, or to a file through a non-blocking writer when
//! [`LoggingConfig::file`] is set. `RUST_LOG` takes precedence over the
//! configured level.
//!
//! # Example
//!
//! ```ignore
//! let _guard = init_logging(&LoggingConfig::default().with_level("indoormap=debug"))?;
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Filter directives used when none are configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Log file path has no file name: {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to create log directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info` or `indoormap=debug,warn`.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Parse filter directives.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives),
        _ => parse_filter(&config.level),
    }
}

/// Split a log file path into the directory and file name the appender
/// expects. A bare file name lives in the current directory.
fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), LoggingError> {
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}

/// Install the global subscriber.
///
/// When logging to a file the returned guard flushes pending lines on drop;
/// keep it alive for the life of the program.
///
/// # Errors
///
/// Fails on invalid filter directives, an unusable log path, or when a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = env_filter(config)?;

    let Some(path) = &config.file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;
        return Ok(None);
    };

    let (dir, name) = split_log_path(path)?;
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::Io {
        path: dir.clone(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(&dir, &name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.file.is_none());
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("debug").is_ok());
        assert!(parse_filter("indoormap=trace,warn").is_ok());
        assert!(matches!(
            parse_filter("indoormap=loud"),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/indoormap/run.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/indoormap"));
        assert_eq!(name, PathBuf::from("run.log"));

        let (dir, name) = split_log_path(Path::new("run.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("run.log"));

        assert!(matches!(
            split_log_path(Path::new("/")),
            Err(LoggingError::InvalidPath(_))
        ));
    }
}
