//! Logger setup in a process whose global subscriber belongs to someone else.
//!
//! Kept in its own test binary because it claims the global tracing dispatcher.

use llm_bridge::logging::{init_logger_in, router, LoggerError, API_CALLS};
use std::fs;
use tracing_subscriber::prelude::*;

#[test]
fn test_foreign_subscriber_is_reported_and_router_layer_still_works() {
    let dir = tempfile::tempdir().unwrap();

    // The host composes the router with its own fmt layer and installs that.
    tracing_subscriber::registry()
        .with(router().clone())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .unwrap();

    // init_logger cannot take over the dispatcher and must say so.
    let err = init_logger_in(API_CALLS, dir.path()).unwrap_err();
    assert!(matches!(err, LoggerError::Install(_)));
    assert!(err.to_string().starts_with("failed to install log router"));

    // Registering on the composed router still routes client events to the file.
    let logger = router().register(API_CALLS, dir.path());
    tracing::error!(target: API_CALLS, "attempt 1/3 failed");

    let contents = fs::read_to_string(logger.log_file().unwrap()).unwrap();
    assert!(contents.contains(" - api_calls - ERROR - attempt 1/3 failed"));
}
