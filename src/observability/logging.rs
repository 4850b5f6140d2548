//! Structured logging settings.

use std::fmt;
use std::path::PathBuf;

/// Default filter directive.
pub const DEFAULT_FILTER: &str = "kinship=info";

/// Filter used when verbose output is requested.
pub const VERBOSE_FILTER: &str = "kinship=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Returns the format as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }

    /// Parses a format name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `kinship=debug,rusqlite=warn`.
    pub filter: String,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Raises the filter to debug level when `verbose` is set and the
    /// filter is still the default.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose && self.filter == DEFAULT_FILTER {
            self.filter = VERBOSE_FILTER.to_string();
        }
        self
    }
}
