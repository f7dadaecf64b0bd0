//! Tracing subscriber setup for hosts that don't install their own.

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "UITEST_REPORT_LOG";

/// Install a stderr `fmt` subscriber.
///
/// The filter comes from `UITEST_REPORT_LOG`, then `RUST_LOG`, then `warn`.
/// Returns false if a global subscriber was already set.
pub fn init() -> bool {
    let filter = dotenvy::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
