//! Storage seams for ranges and routing domains
//!
//! [`RangeRepository`] is the long-lived handle shared by request handlers.
//! Every allocation runs inside one [`RepositoryScope`]: rows read through
//! a scope stay locked against other scopes until it commits or rolls back,
//! which is what keeps the read, search and insert sequence atomic across
//! concurrent requests and replicas. Dropping a scope without committing
//! discards its writes.

use crate::error::IpamError;
use crate::model::{NewRange, NewRoutingDomain, Range, RoutingDomain, RoutingDomainUpdate};

/// Repository for ranges and routing domains.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait RangeRepository: Send + Sync {
    /// Open an exclusive scope (a transaction for SQL stores).
    async fn begin(&self) -> Result<Box<dyn RepositoryScope>, IpamError>;

    // Routing domains
    async fn list_domains(&self) -> Result<Vec<RoutingDomain>, IpamError>;
    async fn get_domain(&self, id: i64) -> Result<RoutingDomain, IpamError>;
    async fn create_domain(&self, domain: NewRoutingDomain) -> Result<RoutingDomain, IpamError>;
    async fn update_domain(
        &self,
        id: i64,
        update: RoutingDomainUpdate,
    ) -> Result<RoutingDomain, IpamError>;
    /// Fails with `InUse` while the domain still owns ranges.
    async fn delete_domain(&self, id: i64) -> Result<(), IpamError>;

    // Ranges (unlocked reads)
    async fn list_ranges(&self) -> Result<Vec<Range>, IpamError>;
    async fn get_range(&self, id: i64) -> Result<Range, IpamError>;
}

/// One exclusive unit of work against the repository.
#[async_trait::async_trait]
pub trait RepositoryScope: Send {
    /// The routing domain with the lowest id, if any exists.
    async fn default_domain(&mut self) -> Result<Option<RoutingDomain>, IpamError>;
    async fn get_domain(&mut self, id: i64) -> Result<Option<RoutingDomain>, IpamError>;

    async fn get_by_id(&mut self, id: i64) -> Result<Option<Range>, IpamError>;
    async fn get_by_cidr_in_domain(
        &mut self,
        cidr: &str,
        domain_id: i64,
    ) -> Result<Option<Range>, IpamError>;
    async fn list_by_parent(&mut self, parent_id: i64) -> Result<Vec<Range>, IpamError>;
    async fn list_by_domain(&mut self, domain_id: i64) -> Result<Vec<Range>, IpamError>;

    /// Insert a range and return its new id.
    async fn insert(&mut self, range: NewRange) -> Result<i64, IpamError>;
    async fn delete_range(&mut self, id: i64) -> Result<(), IpamError>;

    /// Make the scope's writes visible and release its locks.
    async fn commit(&mut self) -> Result<(), IpamError>;
    /// Discard the scope's writes and release its locks.
    async fn rollback(&mut self) -> Result<(), IpamError>;
}
