//! Error types for the petitions exporter
//!
//! `AppError` covers configuration, lifecycle and HTTP-facing failures and
//! implements `IntoResponse` for Axum handlers. `FetchError` classifies a
//! single failed page request against the upstream petitions API, and
//! `ListError` pairs it with whatever was fetched before the failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::petitions::Petition;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Petitions fetcher already started (state: {state})")]
    FetcherAlreadyStarted { state: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

/// Failure of a single page request against the petitions API
///
/// Every variant carries the URL of the page that failed so log lines and
/// error messages can point at the offending request.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Expected 200 from {url}, got {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode petitions page from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid next link {next:?} on page {url}: {reason}")]
    InvalidNextLink {
        url: String,
        next: String,
        reason: String,
    },

    #[error("Pagination limit of {max_pages} pages exceeded (next page: {url})")]
    PaginationLimitExceeded { url: String, max_pages: usize },

    #[error("Pagination cycle detected: {url} was already fetched")]
    PaginationCycle { url: String },
}

impl FetchError {
    /// URL of the page request that failed
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Timeout { url, .. }
            | Self::UnexpectedStatus { url, .. }
            | Self::Body { url, .. }
            | Self::Decode { url, .. }
            | Self::InvalidNextLink { url, .. }
            | Self::PaginationLimitExceeded { url, .. }
            | Self::PaginationCycle { url } => url,
        }
    }

    /// HTTP status for protocol errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short, stable name of the error class, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::UnexpectedStatus { .. } => "status",
            Self::Body { .. } => "body",
            Self::Decode { .. } => "decode",
            Self::InvalidNextLink { .. } => "next_link",
            Self::PaginationLimitExceeded { .. } => "pagination_limit",
            Self::PaginationCycle { .. } => "pagination_cycle",
        }
    }
}

/// A failed `list()` call
///
/// `fetched` holds every petition decoded before the failing page. It is
/// incomplete by definition and must not be published.
#[derive(Error, Debug)]
#[error("{source} ({} petitions fetched before failure)", .fetched.len())]
pub struct ListError {
    pub fetched: Vec<Petition>,
    #[source]
    pub source: FetchError,
}
