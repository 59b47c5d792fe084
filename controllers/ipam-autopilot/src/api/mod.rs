//! HTTP surface
//!
//! REST endpoints for ranges and routing domains, the Kubernetes admission
//! webhooks, and the liveness and metrics probes.

pub mod admission;
pub mod domains;
pub mod ranges;

#[cfg(test)]
mod admission_test;

use crate::error::ApiError;
use crate::metrics::Metrics;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ipam_core::Allocator;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub allocator: Allocator,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(allocator: Allocator, metrics: Metrics) -> Self {
        Self {
            allocator,
            metrics: Arc::new(metrics),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/ranges", get(ranges::list_ranges).post(ranges::create_range))
        .route(
            "/ranges/{id}",
            get(ranges::get_range).delete(ranges::delete_range),
        )
        .route(
            "/domains",
            get(domains::list_domains).post(domains::create_domain),
        )
        .route(
            "/domains/{id}",
            get(domains::get_domain)
                .put(domains::update_domain)
                .delete(domains::delete_domain),
        )
        .route("/admission/validating", post(admission::validating))
        .route("/admission/mutating", post(admission::mutating))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "IPAM Autopilot up and running"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.encode()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Numeric path segment
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id {:?}: must be an integer", raw)))
}

/// Unwrap a JSON body, reporting decode failures as 400 with our error body
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(format!("Bad format: {}", rejection.body_text())))
}
