//! Logging setup for the `dsrq` binary.
//!
//! Stdout carries the JSON response, so logs go to stderr by default or to a
//! file under the platform state directory.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Sends logs to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Writes logs to [`get_log_path`]. Falls back to stderr if the file cannot
/// be opened.
pub fn init_file_logging() {
    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging();
            return;
        }
    }

    let log_file = match open_log_file(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {}: {e}", log_path.display());
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Opens the log file for a new run (truncate on each run to avoid unbounded growth).
fn open_log_file(path: &Path) -> io::Result<File> {
    File::create(path)
}

/// Returns the log file path: `<state_dir>/dsr-query/dsrq.log`, else the
/// config directory, else the temp directory.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("dsr-query").join("dsrq.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("dsr-query").join("dsrq.log");
    }

    std::env::temp_dir().join("dsrq.log")
}
