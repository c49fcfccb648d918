//! Axum middleware for the exporter's own HTTP surface

pub mod http_metrics;
pub mod request_id;

pub use http_metrics::http_metrics_middleware;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
