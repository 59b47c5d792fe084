//! External inventory seam
//!
//! Subnets that exist in the cloud but were never allocated here still
//! occupy address space. An [`ExternalInventory`] reports them so the
//! allocator can treat them as taken.

use crate::error::IpamError;
use crate::model::ExternalRange;

#[async_trait::async_trait]
pub trait ExternalInventory: Send + Sync {
    /// Subnets under `scope_id` (e.g. an organization) that belong to one of `networks`.
    async fn fetch_external_ranges(
        &self,
        scope_id: &str,
        networks: &[String],
    ) -> Result<Vec<ExternalRange>, IpamError>;
}
