//! Shared helpers and error types for the use-case dashboard.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Directory name used under the platform config and cache directories.
pub const APP_DIR_NAME: &str = "ucd";

const LOG_FILE_NAME: &str = "ucd.log";

/// Result type for shared helpers.
pub type UtilsResult<T> = Result<T, UtilsError>;

/// Failures while preparing logging.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// The log file or its directory could not be opened.
    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),
    /// The platform has no cache directory to hold the log file.
    #[error("unable to determine cache directory")]
    NoCacheDir,
    /// A global subscriber was already installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Standard error, for one-shot commands.
    Stderr,
    /// An append-only file, for the full-screen dashboard.
    File(PathBuf),
}

/// Lower-case a search query or a field before matching.
pub fn fold_case(input: &str) -> String {
    input.to_lowercase()
}

/// Case-insensitive substring check. `needle` must already be folded.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || fold_case(haystack).contains(needle)
}

/// Default log file location for the dashboard.
pub fn default_log_path() -> UtilsResult<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(LOG_FILE_NAME))
        .ok_or(UtilsError::NoCacheDir)
}

/// Map a `-v` count onto a default filter directive.
pub fn verbosity_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init_logging(verbosity: u8, sink: &LogSink) -> UtilsResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbosity)));

    let result = match sink {
        LogSink::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogSink::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };
    result.map_err(|err| UtilsError::Logging(err.to_string()))
}
