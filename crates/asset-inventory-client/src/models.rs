//! Cloud Asset Inventory API models
//!
//! These models match the `v1` REST representation of `ListAssets` with
//! `contentType=RESOURCE`. Only the subnetwork fields needed to know which
//! address space is taken are decoded.

use serde::{Deserialize, Serialize};

/// Asset type of VPC subnetworks
pub const SUBNETWORK_ASSET_TYPE: &str = "compute.googleapis.com/Subnetwork";

/// One page of `ListAssets`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAssetsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Empty or absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Asset wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Full resource name, e.g. `//compute.googleapis.com/projects/p/regions/r/subnetworks/s`
    pub name: String,
    pub asset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<AssetResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResource {
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SubnetworkData>,
}

/// Compute API `Subnetwork` resource body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetworkData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Network URL, e.g. `https://www.googleapis.com/compute/v1/projects/p/global/networks/n`
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub ip_cidr_range: String,
    #[serde(default)]
    pub secondary_ip_ranges: Vec<SecondaryIpRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryIpRange {
    #[serde(default)]
    pub range_name: String,
    pub ip_cidr_range: String,
}

/// Flattened subnetwork as returned by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnetwork {
    pub id: String,
    /// Asset name
    pub name: String,
    pub network: String,
    pub ip_cidr_range: String,
    pub secondary_ip_ranges: Vec<SecondaryIpRange>,
}

impl Asset {
    /// Subnetwork view of the asset, if it carries subnetwork data.
    pub fn into_subnetwork(self) -> Option<Subnetwork> {
        let data = self.resource?.data?;
        Some(Subnetwork {
            id: data.id,
            name: self.name,
            network: data.network,
            ip_cidr_range: data.ip_cidr_range,
            secondary_ip_ranges: data.secondary_ip_ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_list_assets_page() {
        let body = r#"{
            "readTime": "2026-01-01T00:00:00Z",
            "assets": [
                {
                    "name": "//compute.googleapis.com/projects/p/regions/europe-west1/subnetworks/gke",
                    "assetType": "compute.googleapis.com/Subnetwork",
                    "resource": {
                        "version": "v1",
                        "discoveryName": "Subnetwork",
                        "data": {
                            "id": "4242",
                            "name": "gke",
                            "network": "https://www.googleapis.com/compute/v1/projects/p/global/networks/shared",
                            "ipCidrRange": "10.0.0.0/22",
                            "region": "https://www.googleapis.com/compute/v1/projects/p/regions/europe-west1",
                            "secondaryIpRanges": [
                                {"rangeName": "pods", "ipCidrRange": "10.4.0.0/14"},
                                {"rangeName": "services", "ipCidrRange": "10.8.0.0/20"}
                            ]
                        }
                    }
                },
                {
                    "name": "//compute.googleapis.com/projects/p/regions/us-east1/subnetworks/empty",
                    "assetType": "compute.googleapis.com/Subnetwork"
                }
            ],
            "nextPageToken": "abc"
        }"#;

        let page: ListAssetsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        assert_eq!(page.assets.len(), 2);

        let mut assets = page.assets.into_iter();
        let subnet = assets.next().unwrap().into_subnetwork().unwrap();
        assert_eq!(subnet.id, "4242");
        assert_eq!(subnet.ip_cidr_range, "10.0.0.0/22");
        assert_eq!(subnet.secondary_ip_ranges.len(), 2);
        assert_eq!(subnet.secondary_ip_ranges[0].range_name, "pods");
        assert!(subnet.network.ends_with("/networks/shared"));

        assert!(assets.next().unwrap().into_subnetwork().is_none());
    }

    #[test]
    fn test_decode_last_page() {
        let page: ListAssetsResponse = serde_json::from_str("{}").unwrap();
        assert!(page.assets.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
