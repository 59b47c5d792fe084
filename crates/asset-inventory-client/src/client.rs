//! Cloud Asset Inventory API client
//!
//! Lists subnetwork assets through the v1 REST API:
//! GET /v1/{parent}/assets?assetTypes=compute.googleapis.com/Subnetwork&contentType=RESOURCE

use crate::common::{HttpClient, TokenSource};
use crate::error::InventoryError;
use crate::inventory_trait::AssetInventoryClientTrait;
use crate::models::{Asset, Subnetwork, SUBNETWORK_ASSET_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://cloudasset.googleapis.com";

/// Cloud Asset Inventory API client
#[derive(Debug)]
pub struct AssetInventoryClient {
    http: HttpClient,
}

impl AssetInventoryClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://cloudasset.googleapis.com")
    /// * `token` - where bearer tokens come from
    pub fn new(base_url: String, token: TokenSource) -> Result<Self, InventoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(InventoryError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    /// Override how many times a page fetch is attempted
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.http = self.http.with_max_attempts(max_attempts);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// List every asset of `asset_type` under `parent`, following page tokens.
    pub async fn list_assets(
        &self,
        parent: &str,
        asset_type: &str,
    ) -> Result<Vec<Asset>, InventoryError> {
        let parent = parent.trim_matches('/');
        if parent.is_empty() {
            return Err(InventoryError::InvalidRequest(
                "parent must name an organization, folder or project".to_string(),
            ));
        }

        let query = self
            .http
            .build_query_string(&[("assetTypes", asset_type), ("contentType", "RESOURCE")]);
        self.http
            .fetch_all_pages(&format!("/v1/{}/assets?{}", parent, query))
            .await
    }

    /// Subnetworks under `parent` attached to one of `networks`
    pub async fn list_subnetworks(
        &self,
        parent: &str,
        networks: &[String],
    ) -> Result<Vec<Subnetwork>, InventoryError> {
        let assets = self.list_assets(parent, SUBNETWORK_ASSET_TYPE).await?;
        Ok(filter_subnetworks(assets, networks))
    }
}

/// Keep subnetwork assets whose network is listed; the rest are logged and skipped.
pub(crate) fn filter_subnetworks(assets: Vec<Asset>, networks: &[String]) -> Vec<Subnetwork> {
    assets
        .into_iter()
        .filter_map(Asset::into_subnetwork)
        .filter(|subnet| {
            let wanted = networks.iter().any(|network| *network == subnet.network);
            if !wanted {
                debug!("Ignoring subnetwork {} on network {}", subnet.name, subnet.network);
            }
            wanted
        })
        .collect()
}

#[async_trait::async_trait]
impl AssetInventoryClientTrait for AssetInventoryClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn list_subnetworks(
        &self,
        parent: &str,
        networks: &[String],
    ) -> Result<Vec<Subnetwork>, InventoryError> {
        self.list_subnetworks(parent, networks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListAssetsResponse;

    const SHARED: &str = "https://www.googleapis.com/compute/v1/projects/p/global/networks/shared";

    #[test]
    fn test_filter_subnetworks_by_network() {
        let page: ListAssetsResponse = serde_json::from_value(serde_json::json!({
            "assets": [
                {
                    "name": "//compute.googleapis.com/projects/p/regions/r/subnetworks/a",
                    "assetType": SUBNETWORK_ASSET_TYPE,
                    "resource": {"data": {"network": SHARED, "ipCidrRange": "10.0.0.0/24"}}
                },
                {
                    "name": "//compute.googleapis.com/projects/p/regions/r/subnetworks/b",
                    "assetType": SUBNETWORK_ASSET_TYPE,
                    "resource": {"data": {
                        "network": "https://www.googleapis.com/compute/v1/projects/p/global/networks/other",
                        "ipCidrRange": "10.0.1.0/24"
                    }}
                },
                {
                    "name": "//compute.googleapis.com/projects/p/regions/r/subnetworks/c",
                    "assetType": SUBNETWORK_ASSET_TYPE
                }
            ]
        }))
        .unwrap();

        let subnets = filter_subnetworks(page.assets, &[SHARED.to_string()]);
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets[0].ip_cidr_range, "10.0.0.0/24");
        assert!(subnets[0].name.ends_with("/subnetworks/a"));
    }

    #[tokio::test]
    async fn test_empty_parent_is_rejected() {
        let client = AssetInventoryClient::new(
            DEFAULT_BASE_URL.to_string(),
            TokenSource::Static("token".to_string()),
        )
        .unwrap();
        let result = client.list_assets("/", SUBNETWORK_ASSET_TYPE).await;
        assert!(matches!(result, Err(InventoryError::InvalidRequest(_))));
    }
}
