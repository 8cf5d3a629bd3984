//! Diagnostic logging setup
//!
//! Logs go to stderr so `getconfig` output on stdout stays clean.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging.
///
/// Uses the `RUST_LOG` environment variable if set, otherwise falls back
/// to `default_level` (e.g. "warn", "proj_supervisor=debug").
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();
}

/// Default filter for a `-v` count
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
