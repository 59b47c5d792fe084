//! Routing domain endpoints

use super::{json_body, parse_id, AppState};
use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use ipam_core::{NewRoutingDomain, RoutingDomain, RoutingDomainUpdate};
use serde_json::{json, Value};
use tracing::info;

pub async fn list_domains(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoutingDomain>>, ApiError> {
    Ok(Json(state.allocator.repository().list_domains().await?))
}

pub async fn get_domain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RoutingDomain>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.allocator.repository().get_domain(id).await?))
}

pub async fn create_domain(
    State(state): State<AppState>,
    body: Result<Json<NewRoutingDomain>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let domain = json_body(body)?;
    if domain.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let domain = state.allocator.repository().create_domain(domain).await?;
    info!(
        "Created routing domain {} ({}) with {} VPCs",
        domain.id,
        domain.name,
        domain.vpcs.len()
    );
    Ok(Json(json!({ "id": domain.id })))
}

/// Replace the fields present in the body
pub async fn update_domain(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RoutingDomainUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let update = json_body(body)?;
    state.allocator.repository().update_domain(id, update).await?;
    Ok(Json(json!({})))
}

pub async fn delete_domain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    state.allocator.repository().delete_domain(id).await?;
    info!("Deleted routing domain {}", id);
    Ok(Json(json!({})))
}
