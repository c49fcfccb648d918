//! Health check endpoint
//!
//! Reports that the process is accepting connections. Upstream fetch
//! failures are reported through `petitions_fetcher_errors_total`, not here.

use axum::http::StatusCode;

/// Health check handler
pub async fn handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "healthy")
}
