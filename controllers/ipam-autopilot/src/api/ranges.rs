//! Range endpoints

use super::{json_body, parse_id, AppState};
use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use ipam_core::{AllocationRequest, DomainRef, ExplicitRequest, Range, RangeRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// Body of `POST /ranges`
///
/// With `cidr` the block is imported as given; otherwise a free block of
/// `range_size` is allocated under `parent`.
#[derive(Debug, Default, Deserialize)]
pub struct RangeRequest {
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub range_size: Option<u8>,
    /// Routing domain id; the default domain when empty
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
}

/// Range as rendered by the API
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RangeResponse {
    pub id: i64,
    pub parent: Option<i64>,
    pub name: String,
    pub cidr: String,
}

impl From<Range> for RangeResponse {
    fn from(range: Range) -> Self {
        Self {
            id: range.id,
            parent: range.parent_id,
            name: range.name,
            cidr: range.cidr,
        }
    }
}

impl RangeRequest {
    fn domain(&self) -> Result<DomainRef, ApiError> {
        match non_empty(self.domain.as_deref()) {
            Some(raw) => raw.parse().map(DomainRef::Id).map_err(|_| {
                ApiError::BadRequest(format!("Domain needs to be an integer, got {:?}", raw))
            }),
            None => Ok(DomainRef::Default),
        }
    }

    fn parent(&self) -> Option<RangeRef> {
        non_empty(self.parent.as_deref()).map(RangeRef::parse)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub async fn list_ranges(State(state): State<AppState>) -> Result<Json<Vec<RangeResponse>>, ApiError> {
    let ranges = state.allocator.repository().list_ranges().await?;
    Ok(Json(ranges.into_iter().map(RangeResponse::from).collect()))
}

pub async fn get_range(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RangeResponse>, ApiError> {
    let id = parse_id(&id)?;
    let range = state.allocator.repository().get_range(id).await?;
    Ok(Json(range.into()))
}

pub async fn create_range(
    State(state): State<AppState>,
    body: Result<Json<RangeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(body)?;
    let domain = request.domain()?;
    let parent = request.parent();

    let result = match non_empty(request.cidr.as_deref()) {
        Some(cidr) => {
            let explicit = ExplicitRequest {
                parent,
                domain,
                name: request.name.clone(),
                cidr: cidr.to_string(),
            };
            state.allocator.allocate_explicit(&explicit).await
        }
        None => {
            let prefix_len = request.range_size.ok_or_else(|| {
                ApiError::BadRequest("range_size is required when no cidr is given".to_string())
            })?;
            let allocation = AllocationRequest {
                parent,
                domain,
                prefix_len,
                name: request.name.clone(),
            };
            state.allocator.allocate(&allocation).await
        }
    };
    state.metrics.record_allocation(&result);

    let range = result?;
    Ok(Json(json!({ "id": range.id, "cidr": range.cidr })))
}

pub async fn delete_range(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let range = state.allocator.release(id).await?;
    info!("Deleted range {} ({}) via API", range.id, range.cidr);
    Ok(Json(json!({ "success": true })))
}
