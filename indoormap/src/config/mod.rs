//! INI configuration file.
//!
//! Every key is optional. A missing file or key falls back to the built-in
//! defaults; a value that cannot be parsed fails loading.
//!
//! ```ini
//! [selector]
//! min_zoom = 17
//!
//! [catalog]
//! server_url = https://maps.example.org
//! min_zoom = 17
//! min_area_m = 1000
//! timeout_secs = 30
//!
//! [dataset]
//! default_level = 0
//! show_features_with_empty_level = false
//! layers_to_hide = poi-label, building
//! before_layer_id = road-label
//! layers_file = /etc/indoormap/layers.json
//!
//! [logging]
//! level = info
//! file = /var/log/indoormap.log
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::catalog::{StreamerConfig, DEFAULT_TIMEOUT_SECS};
use crate::dataset::{IndoorMapOptions, DEFAULT_LEVEL};
use crate::logging::LoggingConfig;
use crate::selector::SelectorConfig;
use crate::style::{load_layers_file, StyleError};

/// Configuration file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid config syntax: {0}")]
    Syntax(String),

    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load layers file: {0}")]
    Layers(#[from] StyleError),
}

/// Default configuration file location: `<config dir>/indoormap/config.ini`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("indoormap")
        .join(CONFIG_FILE_NAME)
}

/// `[catalog]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    pub server_url: Option<String>,
    pub timeout_secs: u64,
    pub streamer: StreamerConfig,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            streamer: StreamerConfig::default(),
        }
    }
}

/// `[dataset]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSettings {
    pub default_level: f64,
    pub show_features_with_empty_level: bool,
    pub layers_to_hide: Vec<String>,
    pub before_layer_id: Option<String>,
    /// JSON layer descriptors replacing the bundled set.
    pub layers_file: Option<PathBuf>,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_LEVEL,
            show_features_with_empty_level: false,
            layers_to_hide: Vec::new(),
            before_layer_id: None,
            layers_file: None,
        }
    }
}

impl DatasetSettings {
    /// Build dataset options, reading the layers file if one is set.
    pub fn to_options(&self) -> Result<IndoorMapOptions, ConfigError> {
        let mut options = IndoorMapOptions::default()
            .with_default_level(self.default_level)
            .with_show_features_with_empty_level(self.show_features_with_empty_level)
            .with_layers_to_hide(self.layers_to_hide.iter().cloned());
        if let Some(id) = &self.before_layer_id {
            options = options.with_before_layer_id(id.clone());
        }
        if let Some(path) = &self.layers_file {
            options = options.with_layers(load_layers_file(path)?);
        }
        Ok(options)
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndoorConfig {
    pub selector: SelectorConfig,
    pub catalog: CatalogSettings,
    pub dataset: DatasetSettings,
    pub logging: LoggingConfig,
}

impl IndoorConfig {
    /// Load from the default location, or defaults if no file exists there.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Syntax(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("selector")) {
            let reader = SectionReader::new("selector", section);
            if let Some(zoom) = reader.parse("min_zoom")? {
                config.selector.min_zoom = zoom;
            }
        }

        if let Some(section) = ini.section(Some("catalog")) {
            let reader = SectionReader::new("catalog", section);
            config.catalog.server_url = reader.string("server_url");
            if let Some(zoom) = reader.parse("min_zoom")? {
                config.catalog.streamer.min_zoom = zoom;
            }
            if let Some(area) = reader.parse("min_area_m")? {
                config.catalog.streamer.min_area_m = area;
            }
            if let Some(timeout) = reader.parse("timeout_secs")? {
                config.catalog.timeout_secs = timeout;
            }
        }

        if let Some(section) = ini.section(Some("dataset")) {
            let reader = SectionReader::new("dataset", section);
            if let Some(level) = reader.parse("default_level")? {
                config.dataset.default_level = level;
            }
            if let Some(show) = reader.boolean("show_features_with_empty_level")? {
                config.dataset.show_features_with_empty_level = show;
            }
            if let Some(list) = reader.string("layers_to_hide") {
                config.dataset.layers_to_hide = list
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .collect();
            }
            config.dataset.before_layer_id = reader.string("before_layer_id");
            config.dataset.layers_file = reader.string("layers_file").map(PathBuf::from);
        }

        if let Some(section) = ini.section(Some("logging")) {
            let reader = SectionReader::new("logging", section);
            if let Some(level) = reader.string("level") {
                config.logging.level = level;
            }
            config.logging.file = reader.string("file").map(PathBuf::from);
        }

        Ok(config)
    }
}

/// Typed access to one INI section. Blank values count as missing.
struct SectionReader<'a> {
    name: &'static str,
    properties: &'a Properties,
}

impl<'a> SectionReader<'a> {
    fn new(name: &'static str, properties: &'a Properties) -> Self {
        Self { name, properties }
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.properties
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str) -> Option<String> {
        self.raw(key).map(String::from)
    }

    fn invalid(&self, key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.raw(key)
            .map(|value| value.parse().map_err(|e: T::Err| self.invalid(key, value, e.to_string())))
            .transpose()
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.raw(key)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, value, "expected true or false")),
            })
            .transpose()
    }
}
