//! Tracing setup for supervisor hosts.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

/// Initialize the logging system.
///
/// Verbosity maps 0..=4 onto error..trace; `RUST_LOG` overrides it when
/// set. With a `log_file` the output goes there (ANSI off) instead of
/// stderr. File and line numbers appear from verbosity 3 up.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>, format: LogFormat) -> Result<()> {
    let level = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mlink={level},mlink_core={level}")));
    let registry = tracing_subscriber::registry().with(filter);
    let detailed = verbosity >= 3;

    let attempt = match (log_file, format) {
        (None, LogFormat::Text) => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(detailed)
                    .with_line_number(detailed),
            )
            .try_init(),
        (None, LogFormat::Json) => registry.with(fmt::layer().json()).try_init(),
        (Some(path), LogFormat::Text) => registry
            .with(
                fmt::layer()
                    .with_writer(open_log_file(path)?)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(detailed)
                    .with_line_number(detailed),
            )
            .try_init(),
        (Some(path), LogFormat::Json) => registry
            .with(fmt::layer().json().with_writer(open_log_file(path)?))
            .try_init(),
    };
    attempt.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

fn open_log_file(path: &Path) -> Result<Arc<File>> {
    let file = File::options().create(true).append(true).open(path)?;
    Ok(Arc::new(file))
}

/// Info-level text logging for tests; repeated calls are harmless.
pub fn init_test_logging() {
    let _ = init_logging(2, None, LogFormat::Text);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn init_is_idempotent_enough_for_tests() {
        // Subscriber can only be installed once per process; repeated calls
        // must not panic.
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn log_file_is_created_on_demand() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mlink.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
