//! Logging configuration using tracing
//!
//! Structured logging to stdout with support for the RUST_LOG environment variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line, for log shipping
    #[default]
    Json,
    /// Human-readable text
    Text,
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `level` is used (e.g. "info",
/// "bugbridge=debug").
///
/// # Errors
/// Returns an error if the subscriber has already been initialized
pub fn init(level: &str, format: LogFormat) -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init(),
    };

    result.map_err(|e| {
        crate::BridgeError::Other(format!("Failed to initialize tracing: {}", e))
    })
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init("debug", LogFormat::Text);
}
