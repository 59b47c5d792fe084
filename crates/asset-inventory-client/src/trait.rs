//! AssetInventoryClient trait for mocking
//!
//! This trait abstracts the AssetInventoryClient to enable mocking in unit tests.
//! The concrete AssetInventoryClient implements this trait, and tests can use mock implementations.

use crate::error::InventoryError;
use crate::models::Subnetwork;

/// Trait for Cloud Asset Inventory operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait AssetInventoryClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Subnetworks under `parent` (e.g. `organizations/123`) whose network is one of `networks`
    async fn list_subnetworks(
        &self,
        parent: &str,
        networks: &[String],
    ) -> Result<Vec<Subnetwork>, InventoryError>;
}
