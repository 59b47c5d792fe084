//! Admission webhooks for Config Connector subnetworks
//!
//! The validating webhook rejects a `ComputeSubnetwork` whose explicit
//! `spec.ipCidrRange` overlaps anything in its routing domain. The mutating
//! webhook allocates a range for objects carrying a size annotation and
//! releases it again when the object is deleted.
//!
//! Every other kind is admitted unchanged with a warning. Failures never
//! surface as HTTP errors; the API server receives a deny decision instead.

use super::AppState;
use axum::extract::State;
use axum::Json;
use crds::{
    AnnotationError, ComputeSubnetwork, IpamAnnotations, COMPUTE_GROUP, COMPUTE_SUBNETWORK_KIND,
    COMPUTE_VERSION, RANGE_ID_PATCH_PATH,
};
use ipam_core::{AllocationRequest, DomainRef, IpamError, RangeRef};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub const OVERLAP_MESSAGE: &str = "Overlap for routing domain detected";
pub const RELEASE_FAILED_MESSAGE: &str = "Unable to delete range";

type Review = AdmissionReview<DynamicObject>;
type Request = AdmissionRequest<DynamicObject>;

pub async fn validating(State(state): State<AppState>, Json(review): Json<Review>) -> Json<Review> {
    let response = match TryInto::<Request>::try_into(review) {
        Ok(request) => validate(&state, &request).await,
        Err(err) => {
            warn!("Rejecting malformed admission review: {}", err);
            AdmissionResponse::invalid(err.to_string())
        }
    };
    state.metrics.record_admission("validating", response.allowed);
    Json(response.into_review())
}

pub async fn mutating(State(state): State<AppState>, Json(review): Json<Review>) -> Json<Review> {
    let response = match TryInto::<Request>::try_into(review) {
        Ok(request) => mutate(&state, &request).await,
        Err(err) => {
            warn!("Rejecting malformed admission review: {}", err);
            AdmissionResponse::invalid(err.to_string())
        }
    };
    state.metrics.record_admission("mutating", response.allowed);
    Json(response.into_review())
}

async fn validate(state: &AppState, request: &Request) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    if !is_compute_subnetwork(request) {
        return unsupported_kind(response, request);
    }
    let Some(object) = request.object.as_ref() else {
        return response;
    };
    let annotations = match annotations_of(object) {
        Ok(annotations) => annotations,
        Err(err) => return response.deny(err.to_string()),
    };

    // Unmanaged objects and objects whose range we allocated ourselves pass.
    let Some(domain_id) = annotations.routing_domain_id else {
        return response;
    };
    if annotations.range_id.is_some() {
        return response;
    }

    let subnet = match decode(object) {
        Ok(subnet) => subnet,
        Err(err) => return response.deny(format!("Invalid ComputeSubnetwork: {}", err)),
    };
    let Some(cidr) = subnet.spec.ip_cidr_range.filter(|c| !c.trim().is_empty()) else {
        return response;
    };

    match state
        .allocator
        .check_overlap(DomainRef::Id(domain_id), &cidr)
        .await
    {
        Ok(()) => response,
        Err(IpamError::OverlapDetected { candidate, conflict }) => {
            info!(
                "Denying {}/{}: {} overlaps {} in routing domain {}",
                request.namespace.as_deref().unwrap_or_default(),
                object.name_any(),
                candidate,
                conflict,
                domain_id
            );
            response.deny(OVERLAP_MESSAGE)
        }
        Err(err) => {
            warn!("Overlap check for {} failed: {}", object.name_any(), err);
            response.deny(err.to_string())
        }
    }
}

async fn mutate(state: &AppState, request: &Request) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);
    if !is_compute_subnetwork(request) {
        return unsupported_kind(response, request);
    }
    match request.operation {
        Operation::Create => handle_creation(state, request, response).await,
        Operation::Delete => handle_deletion(state, request, response).await,
        ref operation => {
            response.warnings = Some(vec![format!(
                "This admission hook does not handle {:?} operations",
                operation
            )]);
            response
        }
    }
}

async fn handle_creation(
    state: &AppState,
    request: &Request,
    response: AdmissionResponse,
) -> AdmissionResponse {
    let Some(object) = request.object.as_ref() else {
        return response;
    };
    let annotations = match annotations_of(object) {
        Ok(annotations) => annotations,
        Err(err) => return response.deny(err.to_string()),
    };
    let Some(prefix_len) = annotations.size else {
        return response;
    };
    let subnet = match decode(object) {
        Ok(subnet) => subnet,
        Err(err) => return response.deny(format!("Invalid ComputeSubnetwork: {}", err)),
    };

    let domain = match resolve_domain(state, &subnet, &annotations).await {
        Ok(domain) => domain,
        Err(err) => return response.deny(err.to_string()),
    };
    let allocation = AllocationRequest {
        parent: annotations.parent.as_deref().map(RangeRef::parse),
        domain,
        prefix_len,
        name: object.name_any(),
    };

    if request.dry_run {
        return match state.allocator.preview(&allocation).await {
            Ok(block) => patched(response, None, &block.to_string())
                .unwrap_or_else(|message| AdmissionResponse::from(request).deny(message)),
            Err(err) => response.deny(err.to_string()),
        };
    }

    let result = state.allocator.allocate(&allocation).await;
    state.metrics.record_allocation(&result);
    let range = match result {
        Ok(range) => range,
        Err(err) => {
            warn!("Allocation for {} failed: {}", allocation.name, err);
            return response.deny(err.to_string());
        }
    };

    match patched(response, Some(range.id), &range.cidr) {
        Ok(response) => response,
        Err(message) => {
            error!("Unable to patch {} with range {}: {}", allocation.name, range.id, message);
            release_quietly(state, range.id).await;
            AdmissionResponse::from(request).deny(message)
        }
    }
}

async fn handle_deletion(
    state: &AppState,
    request: &Request,
    mut response: AdmissionResponse,
) -> AdmissionResponse {
    let Some(old) = request.old_object.as_ref() else {
        return response;
    };
    let range_id = match annotations_of(old) {
        Ok(annotations) => annotations.range_id,
        Err(err) => {
            warn!("Ignoring annotations of {}: {}", old.name_any(), err);
            None
        }
    };
    let Some(range_id) = range_id else {
        return response;
    };
    if request.dry_run {
        return response;
    }

    match state.allocator.release(range_id).await {
        Ok(range) => {
            info!(
                "Released range {} ({}) of deleted {}",
                range.id,
                range.cidr,
                old.name_any()
            );
            response
        }
        Err(IpamError::NotFound(_)) => {
            response.warnings = Some(vec![format!("Range {} was already released", range_id)]);
            response
        }
        Err(err) => {
            error!("Unable to delete range {}: {}", range_id, err);
            response.deny(RELEASE_FAILED_MESSAGE)
        }
    }
}

/// Annotated domain, else the domain owning the subnetwork's VPC, else the default
async fn resolve_domain(
    state: &AppState,
    subnet: &ComputeSubnetwork,
    annotations: &IpamAnnotations,
) -> Result<DomainRef, IpamError> {
    if let Some(id) = annotations.routing_domain_id {
        return Ok(DomainRef::Id(id));
    }
    let network = subnet
        .spec
        .network_ref
        .as_ref()
        .and_then(|network| network.network_url(annotations.project_id.as_deref()));
    let Some(network) = network else {
        return Ok(DomainRef::Default);
    };

    let domains = state.allocator.repository().list_domains().await?;
    Ok(domains
        .iter()
        .find(|domain| domain.vpcs.contains(&network))
        .map_or(DomainRef::Default, |domain| DomainRef::Id(domain.id)))
}

fn is_compute_subnetwork(request: &Request) -> bool {
    request.kind.group == COMPUTE_GROUP
        && request.kind.version == COMPUTE_VERSION
        && request.kind.kind == COMPUTE_SUBNETWORK_KIND
}

fn unsupported_kind(mut response: AdmissionResponse, request: &Request) -> AdmissionResponse {
    response.warnings = Some(vec![format!(
        "This admission hook is not able to handle the provided resources group={},version={},kind={}",
        request.kind.group, request.kind.version, request.kind.kind
    )]);
    response
}

fn annotations_of(object: &DynamicObject) -> Result<IpamAnnotations, AnnotationError> {
    IpamAnnotations::from_optional(object.metadata.annotations.as_ref())
}

fn decode(object: &DynamicObject) -> Result<ComputeSubnetwork, serde_json::Error> {
    serde_json::to_value(object).and_then(serde_json::from_value)
}

/// JSON patch recording the range id (when allocated) and setting the CIDR
pub(crate) fn range_patch(
    range_id: Option<i64>,
    cidr: &str,
) -> Result<json_patch::Patch, serde_json::Error> {
    let mut operations = Vec::new();
    if let Some(id) = range_id {
        operations.push(json!({ "op": "add", "path": RANGE_ID_PATCH_PATH, "value": id.to_string() }));
    }
    operations.push(json!({ "op": "add", "path": "/spec/ipCidrRange", "value": cidr }));
    serde_json::from_value(Value::Array(operations))
}

fn patched(
    response: AdmissionResponse,
    range_id: Option<i64>,
    cidr: &str,
) -> Result<AdmissionResponse, String> {
    let patch = range_patch(range_id, cidr).map_err(|e| format!("Unable to build patch: {}", e))?;
    response
        .with_patch(patch)
        .map_err(|e| format!("Unable to encode patch: {}", e))
}

async fn release_quietly(state: &AppState, range_id: i64) {
    if let Err(err) = state.allocator.release(range_id).await {
        error!("Unable to roll back range {}: {}", range_id, err);
    }
}
