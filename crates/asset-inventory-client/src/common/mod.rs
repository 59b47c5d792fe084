//! Common utilities for the Cloud Asset API client
//!
//! Provides authenticated GETs with retry and page-token pagination.

pub mod token;

use crate::backoff::FibonacciBackoff;
use crate::error::InventoryError;
use crate::models::{Asset, ListAssetsResponse};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

pub use token::TokenSource;

/// Attempts per request before giving up on transient failures
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// HTTP client wrapper with authentication and retry
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: TokenSource,
    max_attempts: u32,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: TokenSource) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Make a GET request, retrying transient failures with backoff
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, InventoryError> {
        let url = self.build_url(path);
        let mut backoff = FibonacciBackoff::default();
        let mut attempt = 1;
        loop {
            match self.get_once(&url).await {
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = backoff.next_backoff();
                    warn!(
                        "GET {} failed (attempt {}/{}): {}; retrying in {:?}",
                        url, attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn get_once<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, InventoryError> {
        debug!("GET {}", url);
        let token = self.token.token(&self.client).await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(InventoryError::Http)?;

        let status = response.status();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Authentication(format!(
                "GET {} rejected: {} - {}",
                url, status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(InventoryError::Serialization)
    }

    /// Fetch all pages of a `ListAssets` call
    ///
    /// `path` must already carry its query string; the page token is appended.
    pub async fn fetch_all_pages(&self, path: &str) -> Result<Vec<Asset>, InventoryError> {
        let mut all_assets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_path = match &page_token {
                Some(token) => format!("{}&pageToken={}", path, urlencoding::encode(token)),
                None => path.to_string(),
            };
            debug!("Fetching page: {}", page_path);

            let page: ListAssetsResponse = self.get(&page_path).await?;
            all_assets.extend(page.assets);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(all_assets)
    }
}
