//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden by
//! environment variables:
//!
//! | Setting | TOML key | Environment |
//! |---------|----------|-------------|
//! | Database file | `database_path` | `KINSHIP_DATABASE` |
//! | Log format (`pretty`, `json`) | `logging.format` | `KINSHIP_LOG_FORMAT` |
//! | Log filter directive | `logging.filter` | `KINSHIP_LOG` |
//! | Log file | `logging.file` | |
//! | Re-sync edges after repair | `repair.sync_edges` | |
//!
//! ```toml
//! database_path = "/var/lib/kinship/families.db"
//!
//! [logging]
//! format = "json"
//! filter = "kinship=debug"
//!
//! [repair]
//! sync_edges = false
//! ```

use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the database path.
pub const DATABASE_ENV: &str = "KINSHIP_DATABASE";
/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "KINSHIP_LOG_FORMAT";
/// Environment variable overriding the log filter.
pub const LOG_FILTER_ENV: &str = "KINSHIP_LOG";

/// Main configuration for kinship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinshipConfig {
    /// Path to the `SQLite` database.
    pub database_path: PathBuf,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Repair configuration.
    pub repair: RepairConfig,
}

/// Repair configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairConfig {
    /// Rewrite Father/Mother edges to match repaired member links.
    pub sync_edges: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self { sync_edges: true }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub database_path: Option<String>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Repair section.
    pub repair: Option<ConfigFileRepair>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Repair section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileRepair {
    /// Re-sync parent edges after repair.
    pub sync_edges: Option<bool>,
}

impl Default for KinshipConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            repair: RepairConfig::default(),
        }
    }
}

fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("kinship.db"),
        |dirs| dirs.data_dir().join("kinship").join("kinship.db"),
    )
}

impl KinshipConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration the way the binary does.
    ///
    /// Reads `path` if given, else the default location, then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be read or parsed, or if
    /// an override has an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the platform config directory
    /// (`kinship/config.toml`).
    ///
    /// Returns default configuration if no usable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("kinship").join("config.toml");
        if platform_config.exists() {
            match Self::load_from_file(&platform_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(
                    path = %platform_config.display(),
                    error = %e,
                    "Ignoring unreadable config file"
                ),
            }
        }

        Self::default()
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the log format override is not recognized.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = lookup(DATABASE_ENV).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV).filter(|v| !v.is_empty()) {
            self.logging.format = parse_log_format(&format)?;
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|v| !v.is_empty()) {
            self.logging.filter = filter;
        }
        Ok(self)
    }

    /// Converts a `ConfigFile` to `KinshipConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = parse_log_format(&format)?;
            }
            if let Some(filter) = logging.filter {
                config.logging.filter = filter;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(sync_edges) = file.repair.and_then(|r| r.sync_edges) {
            config.repair.sync_edges = sync_edges;
        }

        Ok(config)
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat> {
    LogFormat::parse(value).ok_or_else(|| Error::InvalidInput(format!("unknown log format: {value}")))
}
