//! Logging setup for the provider process.
//!
//! All logs go to **stderr**; stdout carries the handshake line the engine
//! reads to find the gRPC address.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`,
//!   `hemmer_provider_terraxcel=debug`)
//!
//! ```bash
//! # Trace every API request the provider makes
//! RUST_LOG=hemmer_provider_terraxcel::client=debug ./hemmer-provider-terraxcel
//! ```

use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

fn stderr_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn install(default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .try_init()
}

/// Initialize logging at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Like [`init_logging`], with a different fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = install(default_level) {
        panic!("failed to initialize logging: {}", e);
    }
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    install(DEFAULT_LEVEL).is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // non-panicking entry point is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_terraxcel=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_terraxcel::client=debug").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
