//! Command-line interface for the petitions exporter
//!
//! Provides argument parsing and subcommand handling for the binary.

use clap::{Parser, Subcommand};

/// Prometheus exporter for open UK Parliament petitions
#[derive(Parser)]
#[command(name = "petitions-exporter")]
#[command(version)]
#[command(about = "Prometheus exporter for open UK Parliament petitions")]
#[command(
    long_about = "Periodically lists every open petition from the petitions API and \
    serves their signature counts, plus fetcher error and latency metrics, on /metrics. \
    The upstream base URL can be overridden with the PETITIONS_URL environment variable."
)]
pub struct Cli {
    /// Path to configuration file (built-in defaults are used when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Petitions Exporter Configuration
# =================================
#
# Every section and key is optional; the values below are the defaults.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port serving /health and /metrics
port = 8080

# Seconds in-flight HTTP requests may drain after SIGTERM before the
# fetcher is stopped
shutdown_grace_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# UPSTREAM PETITIONS API
# ─────────────────────────────────────────────────────────────────────────────

[upstream]
# Base URL of the petitions API. PETITIONS_URL overrides this value.
base_url = "https://petition.parliament.uk"

# Seconds between fetch cycles. The first fetch runs immediately on startup.
poll_interval_seconds = 600

# Deadline for each page request
request_timeout_seconds = 30

# Maximum pages followed in a single listing before it is failed
max_pages = 1000

# Remove gauges for petitions that are no longer open. When false, a closed
# petition keeps reporting its last signature count until restart.
retract_stale_petitions = false

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG takes precedence)
log_level = "info"

# Log format: "json" or "text"
log_format = "json"
"#
}
