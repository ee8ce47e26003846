//! CLI error type.

use std::fmt;

use indoormap::catalog::CatalogError;
use indoormap::config::ConfigError;
use indoormap::dataset::DatasetError;
use indoormap::filter::FilterError;
use indoormap::logging::LoggingError;
use indoormap::style::StyleError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration problem, including missing required settings
    Config(String),
    Dataset(DatasetError),
    Filter(FilterError),
    Style(StyleError),
    Catalog(CatalogError),
    Logging(LoggingError),
    /// Malformed JSON given on the command line
    Json(serde_json::Error),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Dataset(e) => write!(f, "Invalid dataset: {}", e),
            CliError::Filter(e) => write!(f, "Invalid filter: {}", e),
            CliError::Style(e) => write!(f, "Invalid layers: {}", e),
            CliError::Catalog(e) => write!(f, "Catalog error: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::Dataset(e) => Some(e),
            CliError::Filter(e) => Some(e),
            CliError::Style(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Runtime(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<DatasetError> for CliError {
    fn from(e: DatasetError) -> Self {
        CliError::Dataset(e)
    }
}

impl From<FilterError> for CliError {
    fn from(e: FilterError) -> Self {
        CliError::Filter(e)
    }
}

impl From<StyleError> for CliError {
    fn from(e: StyleError) -> Self {
        CliError::Style(e)
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}
