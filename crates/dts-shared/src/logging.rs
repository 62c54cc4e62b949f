//! # Logging Setup
//!
//! Tracing initialization shared by the server binary and tests. Filtering is
//! controlled by the `DTS_LOG` environment variable (default `info`); setting
//! `DTS_LOG_FORMAT=json` switches to line-delimited JSON output.

use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter
pub const LOG_FILTER_ENV: &str = "DTS_LOG";

/// Environment variable selecting the log format (`json` or human-readable)
pub const LOG_FORMAT_ENV: &str = "DTS_LOG_FORMAT";

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops (tests initialize
/// logging independently per process).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
