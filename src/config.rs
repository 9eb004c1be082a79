//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::series::{InputFormat, SeriesReader};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Series input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Input format; guessed from the file extension when unset
    pub format: Option<InputFormat>,

    #[serde(default)]
    pub timestamp_column: usize,

    #[serde(default = "default_value_column")]
    pub value_column: usize,

    #[serde(default = "default_has_header")]
    pub has_header: bool,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_value_column() -> usize {
    1
}

fn default_has_header() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            format: None,
            timestamp_column: 0,
            value_column: default_value_column(),
            has_header: default_has_header(),
            delimiter: default_delimiter(),
        }
    }
}

impl InputConfig {
    /// Build a series reader with this column mapping
    pub fn reader(&self) -> SeriesReader {
        SeriesReader::new()
            .with_timestamp_column(self.timestamp_column)
            .with_value_column(self.value_column)
            .with_header(self.has_header)
            .with_delimiter(self.delimiter as u8)
    }
}

/// Result output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON results
    #[serde(default)]
    pub pretty: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tempora").join("config.toml")),
            Some(PathBuf::from("./tempora.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "input delimiter '{}' must be an ASCII character",
                self.input.delimiter
            )));
        }
        if !is_log_format(&self.logging.format) {
            return Err(ConfigError::Invalid(format!(
                "unknown log format '{}', expected 'pretty' or 'json'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(level) = var("TEMPORA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("TEMPORA_LOG_FORMAT") {
            if is_log_format(&format) {
                self.logging.format = format;
            } else {
                tracing::warn!("Ignoring unknown TEMPORA_LOG_FORMAT '{}'", format);
            }
        }

        if let Some(format) = var("TEMPORA_INPUT_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "csv" => self.input.format = Some(InputFormat::Csv),
                "json" => self.input.format = Some(InputFormat::Json),
                other => tracing::warn!("Ignoring unknown TEMPORA_INPUT_FORMAT '{}'", other),
            }
        }

        if let Some(pretty) = var("TEMPORA_PRETTY") {
            if let Ok(p) = pretty.parse() {
                self.output.pretty = p;
            }
        }
    }
}

fn is_log_format(format: &str) -> bool {
    matches!(format, "pretty" | "json")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Tempora Configuration
#
# Environment variables override these settings:
# - TEMPORA_LOG_LEVEL
# - TEMPORA_LOG_FORMAT
# - TEMPORA_INPUT_FORMAT
# - TEMPORA_PRETTY

[input]
# Input format: csv or json (default: guessed from the file extension)
# format = "csv"

# CSV column holding timestamps (0-indexed, RFC 3339 or epoch millis)
timestamp_column = 0

# CSV column holding values (0-indexed)
value_column = 1

# Whether the CSV has a header row
has_header = true

# CSV field delimiter
delimiter = ","

[output]
# Pretty-print JSON results
pretty = false

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
