//! Cloud Asset Inventory as the allocator's external inventory
//!
//! Subnetworks are decoded by the client; this adapter only reshapes them
//! into [`ExternalRange`] values and folds client errors into
//! [`IpamError::Inventory`].

use asset_inventory_client::{AssetInventoryClientTrait, Subnetwork};
use ipam_core::{ExternalInventory, ExternalRange, IpamError, SecondaryRange};
use std::sync::Arc;
use tracing::debug;

pub struct AssetInventory {
    client: Arc<dyn AssetInventoryClientTrait>,
}

impl AssetInventory {
    pub fn new(client: Arc<dyn AssetInventoryClientTrait>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ExternalInventory for AssetInventory {
    async fn fetch_external_ranges(
        &self,
        scope_id: &str,
        networks: &[String],
    ) -> Result<Vec<ExternalRange>, IpamError> {
        let subnets = self
            .client
            .list_subnetworks(scope_id, networks)
            .await
            .map_err(|e| IpamError::Inventory(e.to_string()))?;
        debug!(
            "Cloud Asset Inventory reports {} subnetworks in {} for {} networks",
            subnets.len(),
            scope_id,
            networks.len()
        );
        Ok(subnets.into_iter().map(external_range).collect())
    }
}

fn external_range(subnet: Subnetwork) -> ExternalRange {
    ExternalRange {
        name: subnet.name,
        network: subnet.network,
        cidr: subnet.ip_cidr_range,
        secondary: subnet
            .secondary_ip_ranges
            .into_iter()
            .map(|range| SecondaryRange {
                name: range.range_name,
                cidr: range.ip_cidr_range,
            })
            .collect(),
    }
}
