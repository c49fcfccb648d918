//! Paginated client for `GET /petitions.json?state=open`
//!
//! Follows the `links.next` cursor page by page until the server stops
//! supplying one. One failed page fails the whole listing; no retries are
//! performed here.

use crate::error::{AppError, AppResult, FetchError, ListError};
use crate::petitions::types::{Petition, PetitionsPage};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::collections::HashSet;
use std::time::Duration;

/// Something that can list every currently open petition
///
/// The fetcher depends on this trait rather than on `PetitionsClient`
/// directly so tests can script upstream behaviour.
#[async_trait]
pub trait PetitionSource: Send + Sync {
    /// List all open petitions, in page arrival order
    async fn list(&self) -> Result<Vec<Petition>, ListError>;
}

/// HTTP client for the petitions API
#[derive(Debug, Clone)]
pub struct PetitionsClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    max_pages: usize,
}

impl PetitionsClient {
    /// Create a client for `base_url`
    ///
    /// Every page request is bounded by `request_timeout`, and a single
    /// listing may follow at most `max_pages` pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built or the
    /// page cap is zero.
    pub fn new(base_url: &str, request_timeout: Duration, max_pages: usize) -> AppResult<Self> {
        if max_pages == 0 {
            return Err(AppError::Config(
                "max_pages must be greater than 0".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            max_pages,
        })
    }

    /// Base URL this client was configured with, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the first page of open petitions
    pub fn first_page_url(&self) -> String {
        format!("{}/petitions.json?state=open", self.base_url)
    }

    /// Fetch and decode a single page
    async fn fetch_page(&self, url: &str) -> Result<PetitionsPage, FetchError> {
        tracing::info!(url = %url, "http-get-petitions");

        let response = self.http.get(url).send().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_seconds: self.request_timeout.as_secs(),
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_seconds: self.request_timeout.as_secs(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Resolve a `next` link against the page that supplied it
fn resolve_next(current: &str, next: &str) -> Result<String, FetchError> {
    let invalid = |reason: String| FetchError::InvalidNextLink {
        url: current.to_string(),
        next: next.to_string(),
        reason,
    };

    let base = Url::parse(current).map_err(|e| invalid(e.to_string()))?;
    let resolved = base.join(next).map_err(|e| invalid(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => Ok(resolved.to_string()),
        other => Err(invalid(format!("unsupported scheme {:?}", other))),
    }
}

/// Log a listing failure and package it with the partial result
fn list_failed(fetched: Vec<Petition>, source: FetchError) -> ListError {
    tracing::error!(
        url = %source.url(),
        code = ?source.status(),
        error_kind = source.kind(),
        error = %source,
        fetched = fetched.len(),
        "failed to list petitions"
    );
    ListError { fetched, source }
}

#[async_trait]
impl PetitionSource for PetitionsClient {
    async fn list(&self) -> Result<Vec<Petition>, ListError> {
        let mut petitions = Vec::new();
        let mut visited = HashSet::new();
        let mut next_url = Some(self.first_page_url());

        while let Some(url) = next_url.take() {
            if visited.len() >= self.max_pages {
                let source = FetchError::PaginationLimitExceeded {
                    url,
                    max_pages: self.max_pages,
                };
                return Err(list_failed(petitions, source));
            }
            if !visited.insert(url.clone()) {
                return Err(list_failed(petitions, FetchError::PaginationCycle { url }));
            }

            let page = match self.fetch_page(&url).await {
                Ok(page) => page,
                Err(source) => return Err(list_failed(petitions, source)),
            };

            petitions.extend(
                page.data
                    .into_iter()
                    .map(|item| item.into_petition(&self.base_url)),
            );

            next_url = match page.links.next() {
                Some(next) => match resolve_next(&url, next) {
                    Ok(resolved) => Some(resolved),
                    Err(source) => return Err(list_failed(petitions, source)),
                },
                None => None,
            };
        }

        tracing::debug!(count = petitions.len(), "listed open petitions");
        Ok(petitions)
    }
}
