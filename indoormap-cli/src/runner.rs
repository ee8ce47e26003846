//! Shared command setup: configuration and logging.

use std::path::Path;

use indoormap::config::IndoorConfig;
use tracing_appender::non_blocking::WorkerGuard;

use crate::error::CliError;

/// Loaded configuration plus the logging guard for one command run.
pub struct CliRunner {
    config: IndoorConfig,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load configuration (from `config_path`, else the default location)
    /// and install logging from its `[logging]` section.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => IndoorConfig::load_from(path)?,
            None => IndoorConfig::load()?,
        };
        let log_guard = indoormap::logging::init_logging(&config.logging)?;
        Ok(Self {
            config,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &IndoorConfig {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        tracing::info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            "indoormap starting"
        );
    }
}
