//! # Structured Logging
//!
//! Initializes the `tracing` subscriber with either pretty or JSON
//! output and environment-based filtering via `RUST_LOG`. Logs go to
//! stderr so stdout stays free for structured output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local development.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

/// Initialize the global tracing subscriber. Call exactly once, early
/// in `main()`.
///
/// `default_directives` applies when `RUST_LOG` is unset; the usual
/// value is `"cortex_node=info,cortex_core=info"`.
pub fn init(default_directives: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::info!(?format, "logging initialized");
}
