//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use crate::config::LogFormat;
use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Build the default filter directive for a log level
fn default_directive(default_level: &str) -> String {
    format!(
        "petitions_exporter={},tower_http={}",
        default_level, default_level
    )
}

/// Initialize tracing subscriber for structured logging
///
/// This can only be called once per process. Subsequent calls are silently ignored.
///
/// Reads log level from RUST_LOG environment variable, defaulting to the
/// level specified in config (or "info" if not set).
///
/// # Examples
///
/// ```no_run
/// use petitions_exporter::config::LogFormat;
///
/// petitions_exporter::telemetry::init("info", LogFormat::Json);
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str, format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(default_level)));

        let registry = tracing_subscriber::registry().with(filter);
        match format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
                .init(),
            LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        }
    });
}
