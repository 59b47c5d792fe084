//! Mock AssetInventoryClient for unit testing
//!
//! This module provides a mock implementation of AssetInventoryClientTrait that can be used
//! in unit tests without reaching the Cloud Asset API.

use crate::error::InventoryError;
use crate::inventory_trait::AssetInventoryClientTrait;
use crate::models::{SecondaryIpRange, Subnetwork};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock AssetInventoryClient for testing
///
/// Stores subnetworks in memory and records every lookup.
#[derive(Debug, Clone, Default)]
pub struct MockAssetInventoryClient {
    base_url: String,
    subnetworks: Arc<Mutex<Vec<Subnetwork>>>,
    failure: Arc<Mutex<Option<u16>>>,
    requests: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl MockAssetInventoryClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Add a subnetwork to the mock inventory (for test setup)
    pub fn add_subnetwork(
        &self,
        network: &str,
        name: &str,
        cidr: &str,
        secondary: &[(&str, &str)],
    ) {
        let subnet = Subnetwork {
            id: (self.len() + 1).to_string(),
            name: name.to_string(),
            network: network.to_string(),
            ip_cidr_range: cidr.to_string(),
            secondary_ip_ranges: secondary
                .iter()
                .map(|(range_name, cidr)| SecondaryIpRange {
                    range_name: (*range_name).to_string(),
                    ip_cidr_range: (*cidr).to_string(),
                })
                .collect(),
        };
        self.subnetworks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subnet);
    }

    /// Make every lookup fail with the given HTTP status
    pub fn fail_with_status(&self, status: u16) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    /// Lookups received so far as `(parent, networks)`
    pub fn requests(&self) -> Vec<(String, Vec<String>)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.subnetworks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait::async_trait]
impl AssetInventoryClientTrait for MockAssetInventoryClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_subnetworks(
        &self,
        parent: &str,
        networks: &[String],
    ) -> Result<Vec<Subnetwork>, InventoryError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((parent.to_string(), networks.to_vec()));

        if let Some(status) = *self.failure.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(InventoryError::Api {
                status,
                body: "mock failure".to_string(),
            });
        }

        Ok(self
            .subnetworks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|subnet| networks.contains(&subnet.network))
            .cloned()
            .collect())
    }
}
