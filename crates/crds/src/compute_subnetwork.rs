//! ComputeSubnetwork (Config Connector)
//!
//! Only the fields the webhooks read or patch are modelled. Unknown fields
//! are ignored on decode, so the type is safe to use on full manifests.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of Config Connector compute resources
pub const COMPUTE_GROUP: &str = "compute.cnrm.cloud.google.com";
/// Served version handled by the webhooks
pub const COMPUTE_VERSION: &str = "v1beta1";
/// Kind handled by the webhooks
pub const COMPUTE_SUBNETWORK_KIND: &str = "ComputeSubnetwork";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "compute.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "ComputeSubnetwork",
    namespaced,
    status = "ComputeSubnetworkStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ComputeSubnetworkSpec {
    /// Primary range; filled in by the mutating webhook when a size annotation is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_cidr_range: Option<String>,

    /// VPC the subnetwork belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_ref: Option<NetworkRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_ip_range: Vec<SubnetworkSecondaryRange>,
}

/// Reference to a `ComputeNetwork`, by object name or by external URL
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Network self link, e.g. `projects/p/global/networks/n`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetworkSecondaryRange {
    pub range_name: String,
    pub ip_cidr_range: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComputeSubnetworkStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl NetworkRef {
    /// Full compute API URL of the referenced VPC
    ///
    /// `external` wins when present. A bare `name` only resolves when the
    /// owning project is known.
    pub fn network_url(&self, project_id: Option<&str>) -> Option<String> {
        const COMPUTE_API: &str = "https://www.googleapis.com/compute/v1/";

        if let Some(external) = self.external.as_deref().filter(|e| !e.is_empty()) {
            if external.starts_with("https://") {
                return Some(external.to_string());
            }
            return Some(format!("{}{}", COMPUTE_API, external.trim_start_matches('/')));
        }

        let name = self.name.as_deref().filter(|n| !n.is_empty())?;
        let project = project_id.filter(|p| !p.is_empty())?;
        Some(format!("{}projects/{}/global/networks/{}", COMPUTE_API, project, name))
    }
}
