//! Tracing setup for hosts that embed the registry.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `default_directive`
/// (e.g. `"info"` or `"entity_registry=debug"`) when the variable is unset.
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).try_init().is_ok()
}

/// Test helper: route registry logs to the test writer, ignoring repeat calls.
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}
