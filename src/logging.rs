//! Logging setup.
//!
//! Logs go to **stderr**; stdout belongs to the host. The filter is read from
//! `TF_LOG_PROVIDER` first, then `RUST_LOG`, then falls back to a default
//! level.
//!
//! ```bash
//! # Lookup and refresh detail for this crate only
//! TF_LOG_PROVIDER=remote_resource_provider=debug terraform plan
//!
//! # Everything at debug
//! RUST_LOG=debug terraform plan
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Host-specific filter variable, checked before `RUST_LOG`.
pub const PROVIDER_LOG_ENV: &str = "TF_LOG_PROVIDER";

/// Level used when neither variable is set.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize the default logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Initialize logging with `default_level` when no filter variable is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(filter_from_env(default_level)).init();
}

/// Try to initialize logging, returning false if a subscriber is already set.
pub fn try_init_logging() -> bool {
    subscriber(filter_from_env(DEFAULT_LEVEL)).try_init().is_ok()
}

fn filter_from_env(default_level: &str) -> EnvFilter {
    resolve_filter(
        std::env::var(PROVIDER_LOG_ENV).ok().as_deref(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        default_level,
    )
}

/// Pick the first directive string that parses.
fn resolve_filter(provider: Option<&str>, rust_log: Option<&str>, default_level: &str) -> EnvFilter {
    [provider, rust_log]
        .into_iter()
        .flatten()
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter resolution is tested here.

    use super::*;

    #[test]
    fn test_provider_variable_wins() {
        let filter = resolve_filter(Some("debug"), Some("warn"), "info");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_falls_back_to_rust_log() {
        let filter = resolve_filter(None, Some("remote_resource_provider=trace"), "info");
        assert_eq!(filter.to_string(), "remote_resource_provider=trace");

        let filter = resolve_filter(Some("  "), Some("warn"), "info");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_default_level() {
        assert_eq!(resolve_filter(None, None, "error").to_string(), "error");
    }
}
