//! Tracing setup for training runs.
//!
//! Human-readable events go to stderr at a verbosity-driven level. When a log
//! directory is given, every event at `debug` and above is also written as
//! JSON lines to `<log_dir>/trainkit.log`, next to the run's configs.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{Error, Result};

/// Name of the JSON log file inside the log directory.
pub const LOG_FILE_NAME: &str = "trainkit.log";

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// 0 = info, 1 = debug, 2+ = trace.
    pub verbosity: u8,
    /// Only errors on stderr. Ignored when `verbosity > 0`.
    pub quiet: bool,
    /// Directory for the JSON log file; stderr only when `None`.
    pub log_dir: Option<PathBuf>,
}

impl LoggingOptions {
    fn stderr_filter(&self) -> &'static str {
        match self.verbosity {
            0 if self.quiet => "error",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as events should reach the log
/// file. Calling this a second time in one process is an error.
pub fn init_logging(options: &LoggingOptions) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(options.stderr_filter()));

    let (json_layer, guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_filter_levels() {
        let mut options = LoggingOptions::default();
        assert_eq!(options.stderr_filter(), "info");
        options.quiet = true;
        assert_eq!(options.stderr_filter(), "error");
        options.verbosity = 1;
        assert_eq!(options.stderr_filter(), "debug");
        options.verbosity = 3;
        assert_eq!(options.stderr_filter(), "trace");
    }

    // The only test in this crate that installs a global subscriber.
    #[test]
    fn test_init_writes_json_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let options = LoggingOptions {
            quiet: true,
            log_dir: Some(dir.path().join("logs")),
            ..LoggingOptions::default()
        };
        let guard = init_logging(&options).unwrap();
        tracing::info!(step = 7, "logging smoke test");
        drop(guard);

        let content = std::fs::read_to_string(dir.path().join("logs").join(LOG_FILE_NAME)).unwrap();
        assert!(content.contains("logging smoke test"));

        assert!(matches!(init_logging(&options), Err(Error::Logging(_))));
    }
}
