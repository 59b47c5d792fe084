//! Access tokens for the Cloud Asset API
//!
//! Either a fixed bearer token from configuration or tokens minted by the
//! GCE/GKE metadata server for the workload's service account. Metadata
//! tokens are cached until shortly before they expire.

use crate::error::InventoryError;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Default metadata server token endpoint
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before their reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// Metadata token and the moment it should be replaced
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Where bearer tokens come from
pub enum TokenSource {
    Static(String),
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::Metadata { url, .. } => {
                f.debug_struct("TokenSource::Metadata").field("url", url).finish()
            }
        }
    }
}

impl TokenSource {
    /// Metadata server at its default address
    pub fn metadata() -> Self {
        Self::metadata_at(METADATA_TOKEN_URL)
    }

    /// Metadata server at a custom address (emulators, tests)
    pub fn metadata_at(url: impl Into<String>) -> Self {
        TokenSource::Metadata {
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching a new one when needed
    pub async fn token(&self, client: &Client) -> Result<String, InventoryError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata { url, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                debug!("Requesting access token from metadata server");
                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| {
                        InventoryError::Authentication(format!("metadata server unreachable: {e}"))
                    })?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(InventoryError::Authentication(format!(
                        "metadata server returned {}: {}",
                        status, body
                    )));
                }

                let token: MetadataToken = response.json().await?;
                let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
                *cached = Some(CachedToken {
                    value: token.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(token.access_token)
            }
        }
    }
}
