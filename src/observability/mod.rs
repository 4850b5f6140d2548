//! Observability.
//!
//! Installs the process-wide `tracing` subscriber. Engine code emits spans
//! and events through `tracing` and counters through the `metrics` facade;
//! counters are dropped unless the embedding application installs a
//! recorder.

mod logging;

pub use logging::{DEFAULT_FILTER, LogFormat, LoggingConfig, VERBOSE_FILTER};

use crate::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging for the process.
///
/// Events go to stderr, or are appended to `config.file` when set.
///
/// # Errors
///
/// Returns an error if logging has already been initialized, the filter
/// directive is invalid, or the log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(init_failed("observability already initialized"));
    }

    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| Error::InvalidInput(format!("invalid log filter '{}': {e}", config.filter)))?;

    let (writer, ansi) = match &config.file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(append_log(path)?)), false),
        None => (BoxMakeWriter::new(io::stderr), true),
    };
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(init_failed)?;

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| init_failed("observability initialized concurrently"))
}

/// Opens `path` for appending, creating missing parent directories.
fn append_log(path: &Path) -> Result<File> {
    let open = || {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    };
    open().map_err(|e: io::Error| Error::OperationFailed {
        operation: "open_log_file".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}

fn init_failed(cause: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_log_file_is_appended_under_new_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("kinship.log");

        for line in ["first\n", "second\n"] {
            let writer = Mutex::new(append_log(&path).unwrap());
            writer.make_writer().write_all(line.as_bytes()).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_unwritable_log_path_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();

        let result = append_log(&blocker.join("kinship.log"));
        assert!(matches!(
            result,
            Err(Error::OperationFailed { operation, .. }) if operation == "open_log_file"
        ));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LoggingConfig {
            filter: "kinship=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(init(&config), Err(Error::InvalidInput(_))));
    }
}
