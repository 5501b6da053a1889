//! Tracing subscriber configuration for prefixd.
//!
//! Log levels follow these conventions:
//! - ERROR: Unrecoverable failures (startup, snapshot restore, exhausted key versions)
//! - WARN: Storage and KV failures, malformed queue commands, conflicts
//! - INFO: Lifecycle events (start, snapshot restored, shutdown)
//! - DEBUG: Per-command and per-flush detail (versions, change sets)
//! - TRACE: Self-echoed KV notifications

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "RUST_LOG_FORMAT";

/// `RUST_LOG` wins over the configured level.
fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the tracing subscriber with human-readable output.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize the tracing subscriber with JSON output.
pub fn init_json(default_level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_level))
        .init();
}

/// Pick [`init_json`] when `RUST_LOG_FORMAT=json`, [`init`] otherwise.
pub fn init_from_env(default_level: &str) {
    if std::env::var(LOG_FORMAT_ENV).as_deref() == Ok("json") {
        init_json(default_level);
    } else {
        init(default_level);
    }
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` so repeated calls from many tests are harmless.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}
