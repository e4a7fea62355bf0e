//! Authenticated HTTP access to the provider APIs
//!
//! Every call attaches a bearer token and a client identifier, and the HTTP
//! outcome is classified into [`ApiError`] so callers can decide whether a
//! failure aborts the run or only the item being processed.

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Token;
use crate::retry::Backoff;

/// Client identifier sent with every request
pub const USER_AGENT: &str = concat!("reposync/", env!("CARGO_PKG_VERSION"));

/// Classified failure of a provider API call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Permission denied for {url}. Check if your token is valid. Otherwise, run 'reposync config' to configure again.")]
    Unauthorized { url: String },

    #[error("Rate limit exceeded for {url}")]
    RateLimited { url: String },

    #[error("Request to {url} failed with status code: {status}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Classify a response status. `None` means the body can be used.
    pub fn from_status(status: StatusCode, url: &str) -> Option<Self> {
        let url = url.to_string();
        match status {
            StatusCode::OK => None,
            StatusCode::UNAUTHORIZED => Some(Self::Unauthorized { url }),
            StatusCode::TOO_MANY_REQUESTS => Some(Self::RateLimited { url }),
            status => Some(Self::Status { url, status }),
        }
    }

    /// Errors that must stop the whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

/// Thin wrapper over `reqwest` shared by both provider adapters
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    backoff: Backoff,
}

impl ApiClient {
    /// Create a client with the default rate-limit backoff
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            backoff: Backoff::default(),
        })
    }

    /// Replace the backoff applied to rate-limited (429) responses
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Issue an authenticated request and return the response body.
    ///
    /// A 429 response is retried with the linear backoff before it is
    /// surfaced as [`ApiError::RateLimited`]. Every other failure is returned
    /// on the first occurrence.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        token: &Token,
    ) -> Result<String, ApiError> {
        self.backoff
            .run(
                |_| self.send_once(method.clone(), url, token),
                ApiError::is_rate_limited,
                |_, attempt, delay| {
                    warn!(
                        "Rate limited on {} (attempt {}), retrying in {:?}",
                        url, attempt, delay
                    );
                },
            )
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        token: &Token,
    ) -> Result<String, ApiError> {
        debug!("{} {}", method, url);

        let response = self
            .http
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token.expose()))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ApiError::Network {
                url: url.to_string(),
                source,
            })?;

        if let Some(err) = ApiError::from_status(response.status(), url) {
            return Err(err);
        }

        response.text().await.map_err(|source| ApiError::Network {
            url: url.to_string(),
            source,
        })
    }

    /// GET a JSON document
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &Token,
    ) -> Result<T, ApiError> {
        let body = self.request(Method::GET, url, token).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// GET every page of a JSON array listing.
    ///
    /// `page_url` builds the URL for a 1-based page number. Pages are fetched
    /// in order until the first empty page, sleeping `delay` between pages.
    pub async fn get_all_pages<T, F>(
        &self,
        page_url: F,
        token: &Token,
        delay: Duration,
    ) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(u32) -> String,
    {
        collect_pages(
            |page| {
                let url = page_url(page);
                async move { self.get_json::<Vec<T>>(&url, token).await }
            },
            delay,
        )
        .await
    }
}

/// Fetch 1-based pages in order until the first empty one, sleeping `delay`
/// after every non-empty page.
pub async fn collect_pages<T, F, Fut>(
    mut fetch_page: F,
    delay: Duration,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let batch = fetch_page(page).await?;
        if batch.is_empty() {
            break;
        }

        debug!("Fetched {} items from page {}", batch.len(), page);
        items.extend(batch);
        page += 1;

        tokio::time::sleep(delay).await;
    }

    Ok(items)
}
