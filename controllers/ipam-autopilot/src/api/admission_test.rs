//! Admission webhook tests
//!
//! Reviews are posted through the router exactly as the API server sends
//! them and the `AdmissionReview` answers are inspected as JSON.

#[cfg(test)]
mod tests {
    use crate::api::admission::{OVERLAP_MESSAGE, RELEASE_FAILED_MESSAGE};
    use crate::api::{router, AppState};
    use crate::inventory::AssetInventory;
    use crate::metrics::Metrics;
    use asset_inventory_client::MockAssetInventoryClient;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use base64::Engine;
    use ipam_core::{Allocator, InMemoryRepository};
    use serde_json::{json, Map, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const SHARED: &str = "https://www.googleapis.com/compute/v1/projects/host/global/networks/shared";

    fn app(repository: &InMemoryRepository) -> Router {
        let allocator = Allocator::new(Arc::new(repository.clone()));
        router(AppState::new(allocator, Metrics::new().unwrap()))
    }

    fn subnetwork(annotations: &[(&str, &str)], spec: Value) -> Value {
        let annotations: Map<String, Value> = annotations
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        json!({
            "apiVersion": "compute.cnrm.cloud.google.com/v1beta1",
            "kind": "ComputeSubnetwork",
            "metadata": {
                "name": "team-a",
                "namespace": "networking",
                "annotations": annotations,
            },
            "spec": spec,
        })
    }

    fn review(
        operation: &str,
        kind: (&str, &str, &str),
        object: Option<Value>,
        old_object: Option<Value>,
        dry_run: bool,
    ) -> Value {
        let (group, version, kind) = kind;
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "9ec4fd53-d3cf-4e9b-af6a-25a398697e3c",
                "kind": {"group": group, "version": version, "kind": kind},
                "resource": {"group": group, "version": version, "resource": "computesubnetworks"},
                "requestKind": {"group": group, "version": version, "kind": kind},
                "requestResource": {"group": group, "version": version, "resource": "computesubnetworks"},
                "name": "team-a",
                "namespace": "networking",
                "operation": operation,
                "userInfo": {"username": "kubernetes-admin", "groups": ["system:masters"]},
                "object": object,
                "oldObject": old_object,
                "dryRun": dry_run,
            }
        })
    }

    const SUBNET: (&str, &str, &str) = (
        "compute.cnrm.cloud.google.com",
        "v1beta1",
        "ComputeSubnetwork",
    );

    async fn post(app: &Router, webhook: &str, review: Value) -> Value {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/admission/{webhook}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(review.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let review: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(review["kind"], "AdmissionReview");
        assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
        review["response"].clone()
    }

    fn message(response: &Value) -> &str {
        response["status"]["message"].as_str().unwrap_or_default()
    }

    fn patch(response: &Value) -> Value {
        let bytes = match &response["patch"] {
            Value::String(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .unwrap(),
            Value::Array(bytes) => bytes.iter().map(|b| b.as_u64().unwrap() as u8).collect(),
            other => panic!("response carries no patch: {other}"),
        };
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Default domain 1 with root range 1 = 10.0.0.0/8
    async fn seeded() -> InMemoryRepository {
        let repository = InMemoryRepository::new();
        let domain = repository.add_domain("default", &[]).await;
        repository
            .add_range(None, domain.id, "root", "10.0.0.0/8")
            .await;
        repository
    }

    #[tokio::test]
    async fn test_other_kinds_are_allowed_with_warning() {
        let app = app(&InMemoryRepository::new());
        let pod = json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "p"}});

        for webhook in ["validating", "mutating"] {
            let response = post(
                &app,
                webhook,
                review("CREATE", ("", "v1", "Pod"), Some(pod.clone()), None, false),
            )
            .await;
            assert_eq!(response["allowed"], true);
            assert_eq!(response["uid"], "9ec4fd53-d3cf-4e9b-af6a-25a398697e3c");
            assert_eq!(
                response["warnings"][0],
                "This admission hook is not able to handle the provided resources group=,version=v1,kind=Pod"
            );
        }
    }

    #[tokio::test]
    async fn test_review_without_request_is_rejected() {
        let app = app(&InMemoryRepository::new());
        let response = post(
            &app,
            "validating",
            json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"}),
        )
        .await;
        assert_eq!(response["allowed"], false);
    }

    #[tokio::test]
    async fn test_validating_allows_unmanaged_objects() {
        let app = app(&seeded().await);
        let object = subnetwork(&[], json!({"ipCidrRange": "10.0.0.0/24"}));

        let response = post(
            &app,
            "validating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], true);
    }

    #[tokio::test]
    async fn test_validating_denies_overlap_in_domain() {
        let repository = InMemoryRepository::new();
        let domain = repository.add_domain("default", &[]).await;
        repository
            .add_range(None, domain.id, "team-b", "10.0.0.0/16")
            .await;
        let app = app(&repository);

        let overlapping = subnetwork(
            &[("ipam.cloud.google.com/routing-domain-id", "1")],
            json!({"ipCidrRange": "10.0.5.0/24"}),
        );
        let response = post(
            &app,
            "validating",
            review("CREATE", SUBNET, Some(overlapping), None, false),
        )
        .await;
        assert_eq!(response["allowed"], false);
        assert_eq!(message(&response), OVERLAP_MESSAGE);

        let disjoint = subnetwork(
            &[("ipam.cloud.google.com/routing-domain-id", "1")],
            json!({"ipCidrRange": "192.168.0.0/24"}),
        );
        let response = post(
            &app,
            "validating",
            review("UPDATE", SUBNET, Some(disjoint), None, false),
        )
        .await;
        assert_eq!(response["allowed"], true);
    }

    #[tokio::test]
    async fn test_validating_skips_allocated_objects() {
        let app = app(&seeded().await);
        let object = subnetwork(
            &[
                ("ipam.cloud.google.com/routing-domain-id", "1"),
                ("ipam.cloud.google.com/range-id", "1"),
            ],
            json!({"ipCidrRange": "10.0.0.0/8"}),
        );

        let response = post(
            &app,
            "validating",
            review("UPDATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], true);
    }

    #[tokio::test]
    async fn test_validating_sees_external_subnets() {
        let repository = InMemoryRepository::new();
        repository.add_domain("shared", &[SHARED]).await;
        let cai = MockAssetInventoryClient::new("http://cai.test");
        cai.add_subnetwork(SHARED, "legacy", "172.16.0.0/20", &[]);

        let allocator = Allocator::new(Arc::new(repository.clone()))
            .with_inventory("organizations/1", Arc::new(AssetInventory::new(Arc::new(cai))));
        let app = router(AppState::new(allocator, Metrics::new().unwrap()));

        let object = subnetwork(
            &[("ipam.cloud.google.com/routing-domain-id", "1")],
            json!({"ipCidrRange": "172.16.4.0/24"}),
        );
        let response = post(
            &app,
            "validating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], false);
        assert_eq!(message(&response), OVERLAP_MESSAGE);
    }

    #[tokio::test]
    async fn test_validating_unknown_domain_is_denied() {
        let app = app(&seeded().await);
        let object = subnetwork(
            &[("ipam.cloud.google.com/routing-domain-id", "9")],
            json!({"ipCidrRange": "192.168.0.0/24"}),
        );

        let response = post(
            &app,
            "validating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], false);
        assert!(!message(&response).is_empty());
    }

    #[tokio::test]
    async fn test_mutating_create_allocates_and_patches() {
        let repository = seeded().await;
        let app = app(&repository);
        let object = subnetwork(
            &[
                ("ipam.cloud.google.com/size", "24"),
                ("ipam.cloud.google.com/parent", "10.0.0.0/8"),
            ],
            json!({"region": "europe-west1", "networkRef": {"name": "shared"}}),
        );

        let response = post(
            &app,
            "mutating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], true);
        assert_eq!(response["patchType"], "JSONPatch");
        assert_eq!(
            patch(&response),
            json!([
                {"op": "add", "path": "/metadata/annotations/ipam.cloud.google.com~1range-id", "value": "2"},
                {"op": "add", "path": "/spec/ipCidrRange", "value": "10.0.0.0/24"},
            ])
        );

        let ranges = repository.ranges().await;
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].name, "team-a");
        assert_eq!(ranges[1].parent_id, Some(1));
        assert_eq!(ranges[1].cidr, "10.0.0.0/24");
    }

    #[tokio::test]
    async fn test_mutating_dry_run_does_not_allocate() {
        let repository = seeded().await;
        let app = app(&repository);
        let object = subnetwork(
            &[
                ("ipam.cloud.google.com/size", "26"),
                ("ipam.cloud.google.com/parent", "1"),
            ],
            json!({}),
        );

        let response = post(
            &app,
            "mutating",
            review("CREATE", SUBNET, Some(object), None, true),
        )
        .await;
        assert_eq!(response["allowed"], true);
        assert_eq!(
            patch(&response),
            json!([{"op": "add", "path": "/spec/ipCidrRange", "value": "10.0.0.0/26"}])
        );
        assert_eq!(repository.ranges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mutating_without_size_is_untouched() {
        let repository = seeded().await;
        let app = app(&repository);
        let object = subnetwork(&[], json!({"ipCidrRange": "10.0.0.0/24"}));

        let response = post(
            &app,
            "mutating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], true);
        assert!(response.get("patch").is_none_or(Value::is_null));
        assert_eq!(repository.ranges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mutating_denies_when_parent_is_full() {
        let repository = InMemoryRepository::new();
        let domain = repository.add_domain("default", &[]).await;
        let parent = repository
            .add_range(None, domain.id, "tiny", "10.0.0.0/30")
            .await;
        repository
            .add_range(Some(parent.id), domain.id, "all", "10.0.0.0/30")
            .await;
        let app = app(&repository);
        let object = subnetwork(
            &[
                ("ipam.cloud.google.com/size", "30"),
                ("ipam.cloud.google.com/parent", "10.0.0.0/30"),
            ],
            json!({}),
        );

        let response = post(
            &app,
            "mutating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], false);
        assert!(message(&response).starts_with("No address range available"));
    }

    #[tokio::test]
    async fn test_mutating_rejects_bad_size_annotation() {
        let app = app(&seeded().await);
        let object = subnetwork(&[("ipam.cloud.google.com/size", "big")], json!({}));

        let response = post(
            &app,
            "mutating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], false);
        assert!(message(&response).contains("ipam.cloud.google.com/size"));
    }

    #[tokio::test]
    async fn test_mutating_picks_domain_by_network() {
        let repository = InMemoryRepository::new();
        repository.add_domain("default", &[]).await;
        let shared = repository.add_domain("shared", &[SHARED]).await;
        repository
            .add_range(None, shared.id, "shared-root", "10.0.0.0/8")
            .await;
        let app = app(&repository);

        let object = subnetwork(
            &[
                ("ipam.cloud.google.com/size", "24"),
                ("ipam.cloud.google.com/parent", "10.0.0.0/8"),
                ("cnrm.cloud.google.com/project-id", "host"),
            ],
            json!({"networkRef": {"name": "shared"}}),
        );
        let response = post(
            &app,
            "mutating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;
        assert_eq!(response["allowed"], true);

        let ranges = repository.ranges().await;
        assert_eq!(ranges[1].routing_domain_id, shared.id);
    }

    #[tokio::test]
    async fn test_mutating_delete_releases_range() {
        let repository = seeded().await;
        let leaf = repository.add_range(Some(1), 1, "team-a", "10.0.0.0/24").await;
        let app = app(&repository);
        let range_id = leaf.id.to_string();
        let old = subnetwork(
            &[("ipam.cloud.google.com/range-id", range_id.as_str())],
            json!({"ipCidrRange": "10.0.0.0/24"}),
        );

        let response = post(
            &app,
            "mutating",
            review("DELETE", SUBNET, None, Some(old), false),
        )
        .await;
        assert_eq!(response["allowed"], true);
        assert_eq!(repository.ranges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mutating_delete_failure_denies() {
        let repository = seeded().await;
        repository.add_range(Some(1), 1, "child", "10.0.0.0/24").await;
        let app = app(&repository);
        let old = subnetwork(
            &[("ipam.cloud.google.com/range-id", "1")],
            json!({"ipCidrRange": "10.0.0.0/8"}),
        );

        let response = post(
            &app,
            "mutating",
            review("DELETE", SUBNET, None, Some(old), false),
        )
        .await;
        assert_eq!(response["allowed"], false);
        assert_eq!(message(&response), RELEASE_FAILED_MESSAGE);
        assert_eq!(repository.ranges().await.len(), 2);
    }

    #[tokio::test]
    async fn test_mutating_delete_of_released_range_is_allowed() {
        let app = app(&seeded().await);
        let old = subnetwork(&[("ipam.cloud.google.com/range-id", "77")], json!({}));

        let response = post(
            &app,
            "mutating",
            review("DELETE", SUBNET, None, Some(old), false),
        )
        .await;
        assert_eq!(response["allowed"], true);
        assert_eq!(response["warnings"][0], "Range 77 was already released");
    }

    #[tokio::test]
    async fn test_mutating_update_is_allowed_with_warning() {
        let app = app(&seeded().await);
        let object = subnetwork(&[("ipam.cloud.google.com/size", "24")], json!({}));

        let response = post(
            &app,
            "mutating",
            review("UPDATE", SUBNET, Some(object.clone()), Some(object), false),
        )
        .await;
        assert_eq!(response["allowed"], true);
        assert!(response["warnings"][0].as_str().unwrap().contains("Update"));
    }

    #[tokio::test]
    async fn test_admission_decisions_are_counted() {
        let repository = InMemoryRepository::new();
        repository.add_domain("default", &[]).await;
        repository.add_range(None, 1, "team-b", "10.0.0.0/16").await;
        let app = app(&repository);
        let object = subnetwork(
            &[("ipam.cloud.google.com/routing-domain-id", "1")],
            json!({"ipCidrRange": "10.0.0.0/24"}),
        );
        post(
            &app,
            "validating",
            review("CREATE", SUBNET, Some(object), None, false),
        )
        .await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(
            r#"ipam_admission_decisions_total{decision="denied",webhook="validating"} 1"#
        ));
    }
}
