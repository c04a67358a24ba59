//! Per-subsystem logging.
//!
//! Library code logs through `tracing` with a fixed target (for example
//! [`API_CALLS`]). [`init_logger`] registers a subsystem with the process-wide
//! [`LogRouter`], which writes that subsystem's `DEBUG`-and-above records to
//! `logs/<name>_<YYYYMMDD>.log` and to the console.
//!
//! The router only sees events if it is part of the global subscriber. Processes
//! that install their own subscriber should add [`router()`] as a layer and register
//! subsystems with [`LogRouter::register`] instead of calling [`init_logger`]:
//!
//! ```rust,no_run
//! use llm_bridge::logging::{logs_dir_for_root, router, API_CALLS};
//! use tracing_subscriber::prelude::*;
//!
//! tracing_subscriber::registry()
//!     .with(router().clone())
//!     .with(tracing_subscriber::fmt::layer())
//!     .init();
//! let _logger = router().register(API_CALLS, &logs_dir_for_root());
//! ```

mod router;
#[cfg(test)]
pub(crate) mod testing;

pub use router::{log_file_path, LogRouter, SubsystemLogger};

use once_cell::sync::{Lazy, OnceCell};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::prelude::*;

use crate::config::{logs_dir, project_root};

/// Target used by the chat clients and the client selector.
pub const API_CALLS: &str = "api_calls";

/// Target used by the market scanner.
pub const MARKET_SCAN: &str = "market_scan";

pub const SUCCESS_ICON: &str = "✓";
pub const ERROR_ICON: &str = "✗";
pub const WAIT_ICON: &str = "⟳";

static ROUTER: Lazy<LogRouter> = Lazy::new(LogRouter::new);
static INSTALLED: OnceCell<Result<(), LoggerError>> = OnceCell::new();

/// Logger setup errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoggerError {
    /// Another global subscriber was installed first, so routed events would never
    /// reach the log files.
    #[error("failed to install log router: {0}")]
    Install(String),
}

/// The process-wide router.
pub fn router() -> &'static LogRouter {
    &ROUTER
}

/// `<project root>/logs`
pub fn logs_dir_for_root() -> PathBuf {
    logs_dir(&project_root())
}

fn install_global_router() -> Result<(), LoggerError> {
    INSTALLED
        .get_or_init(|| {
            tracing_subscriber::registry()
                .with(ROUTER.clone())
                .try_init()
                .map_err(|e| LoggerError::Install(e.to_string()))
        })
        .clone()
}

/// Initialize the logger for `name` under `<project root>/logs`.
pub fn init_logger(name: &str) -> Result<SubsystemLogger, LoggerError> {
    init_logger_in(name, &logs_dir_for_root())
}

/// Initialize the logger for `name` with its log file under `dir`.
///
/// Calling this again for the same name replaces the previous sinks. Fails without
/// registering anything if the router cannot become the global subscriber.
pub fn init_logger_in(name: &str, dir: &Path) -> Result<SubsystemLogger, LoggerError> {
    if let Err(e) = install_global_router() {
        eprintln!("{} {}", ERROR_ICON, e);
        return Err(e);
    }
    let logger = ROUTER.register(name, dir);
    logger.debug("Logger initialization completed");
    logger.info("API logging system started");
    Ok(logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_init_logger_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = init_logger_in("logging_idempotence", dir.path()).unwrap();
        let second = init_logger_in("logging_idempotence", dir.path()).unwrap();

        assert_eq!(first.sink_count(), 2);
        assert_eq!(second.sink_count(), 2);

        let path = second.log_file().unwrap();
        let contents = fs::read_to_string(path).unwrap();
        // One pair of startup lines per initialization, never doubled.
        assert_eq!(contents.matches("API logging system started").count(), 2);
        assert_eq!(contents.matches("Logger initialization completed").count(), 2);
    }

    #[test]
    fn test_init_logger_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let logger = init_logger_in("logging_name", dir.path()).unwrap();
        let file_name = logger
            .log_file()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(file_name.starts_with("logging_name_"));
        assert!(file_name.ends_with(".log"));
        assert_eq!(file_name.len(), "logging_name_".len() + 8 + ".log".len());
    }

    #[test]
    fn test_tracing_events_reach_initialized_logger() {
        let dir = tempfile::tempdir().unwrap();
        let logger = init_logger_in("logging_global", dir.path()).unwrap();

        tracing::error!(target: "logging_global", "attempt 1/3 failed");

        let contents = fs::read_to_string(logger.log_file().unwrap()).unwrap();
        assert!(contents.contains(" - logging_global - ERROR - attempt 1/3 failed"));
    }
}
