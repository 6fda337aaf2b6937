//! Tracing initialization for embedding applications.
//!
//! The library itself only emits `log` records and `tracing` spans; an
//! application (or a test harness) opts into output by calling [`init`]
//! once. `log` records from dependencies are bridged into `tracing` via
//! `tracing-log`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global subscriber with the given filter directive, e.g.
/// `"doctriage=debug"` or `"info"`. Subsequent calls are no-ops, which
/// keeps parallel test binaries from fighting over the global.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    let result = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();

    if result.is_ok() {
        // Route `log` macros through the tracing subscriber as well.
        let _ = tracing_log::LogTracer::init();
    }
}
