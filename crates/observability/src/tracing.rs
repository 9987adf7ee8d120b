//! Tracing/logging initialization.
//!
//! JSON lines on stdout, one object per event, with the active span fields
//! attached. Engine operations open spans carrying usernames, amounts and
//! transaction ids, so every log line can be tied back to the operation that
//! produced it.

use tracing_subscriber::EnvFilter;

/// Resolve the filter: `RUST_LOG` wins, then `fallback`, then `info`.
pub fn filter_from(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with the default `info` filter (overridable via
/// `RUST_LOG`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a configured filter directive, e.g. the ledger's
/// `LOG_FILTER` setting.
pub fn init_with_filter(directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from(directive))
        .json()
        .with_current_span(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
