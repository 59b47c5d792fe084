//! Cloud Asset Inventory client errors

use thiserror::Error;

/// Errors that can occur when querying the Cloud Asset Inventory API
#[derive(Debug, Error)]
pub enum InventoryError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Cloud Asset API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No usable access token (metadata server unreachable, rejected token, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid request (e.g., empty parent)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl InventoryError {
    /// Whether the same request may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            InventoryError::Http(e) => e.is_timeout() || e.is_connect(),
            InventoryError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        let api = |status| InventoryError::Api {
            status,
            body: String::new(),
        };
        assert!(api(429).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(403).is_transient());
        assert!(!api(400).is_transient());
        assert!(!InventoryError::Authentication("expired".to_string()).is_transient());
    }
}
