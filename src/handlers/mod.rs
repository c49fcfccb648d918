//! HTTP request handlers for the petitions exporter

use crate::config::Config;
use crate::metrics::Metrics;
use std::sync::Arc;

pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// Holds the configuration and the metrics registry the fetcher writes to.
/// All fields are cheap to clone across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    metrics: Metrics,
}

impl AppState {
    /// Create a new AppState from configuration and a metrics registry
    pub fn new(config: Arc<Config>, metrics: Metrics) -> Self {
        Self { config, metrics }
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
