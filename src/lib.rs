//! Petitions exporter - Prometheus exporter for open UK Parliament petitions
//!
//! This library polls the paginated petitions API on a fixed interval and
//! publishes each open petition's signature count as a gauge, alongside
//! fetcher error and latency metrics, for scraping over HTTP.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod petitions;
pub mod server;
pub mod telemetry;
