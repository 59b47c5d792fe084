//! Controller-specific error types.
//!
//! `ControllerError` covers startup and configuration failures.
//! `ApiError` is what REST handlers return; it renders the
//! `{"success": false, "message": ...}` body with a status code derived
//! from the underlying [`IpamError`].

use asset_inventory_client::InventoryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ipam_core::IpamError;
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while starting or running IPAM Autopilot.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Allocation or storage error
    #[error("IPAM error: {0}")]
    Ipam(#[from] IpamError),

    /// Cloud Asset Inventory client error
    #[error("Cloud Asset Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Metric registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Listener or server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by REST handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed path or body
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Ipam(#[from] IpamError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ipam(err) if err.is_bad_request() => StatusCode::BAD_REQUEST,
            ApiError::Ipam(IpamError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Ipam(IpamError::InUse(_)) => StatusCode::CONFLICT,
            ApiError::Ipam(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ControllerError> for ApiError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Ipam(err) => ApiError::Ipam(err),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
