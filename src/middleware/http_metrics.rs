//! HTTP server metrics middleware
//!
//! Counts requests and records latency for every route the exporter serves.
//! Requests are labelled by matched route template so unknown paths collapse
//! into a single `unmatched` series.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::handlers::AppState;

/// Path label used for requests that matched no route
pub const UNMATCHED_PATH: &str = "unmatched";

/// Middleware recording `petitions_exporter_http_requests_total` and
/// `petitions_exporter_http_request_duration_seconds`
pub async fn http_metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    state.metrics().record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
