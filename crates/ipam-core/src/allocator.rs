//! Allocation orchestration
//!
//! Each operation opens one repository scope, performs its reads, search
//! and writes through it, and then commits (or rolls back on any error).
//! The whole scope is bounded by a timeout; when it fires the scope is
//! dropped, which discards its writes.

use crate::cidr::parse_block;
use crate::error::IpamError;
use crate::inventory::ExternalInventory;
use crate::model::{DomainRef, NewRange, Range, RangeRef, RoutingDomain};
use crate::overlap::verify_disjoint;
use crate::repository::{RangeRepository, RepositoryScope};
use crate::search::find_next_free_block;
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default upper bound for one allocation scope
pub const DEFAULT_SCOPE_TIMEOUT: Duration = Duration::from_secs(30);

/// Request for a new child range chosen by the allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Required; `None` is rejected with `InvalidInput`
    pub parent: Option<RangeRef>,
    pub domain: DomainRef,
    pub prefix_len: u8,
    pub name: String,
}

/// Request to record a caller-chosen CIDR without searching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitRequest {
    pub parent: Option<RangeRef>,
    pub domain: DomainRef,
    pub name: String,
    pub cidr: String,
}

#[derive(Clone)]
struct InventorySource {
    scope_id: String,
    client: Arc<dyn ExternalInventory>,
}

struct Placement {
    domain: RoutingDomain,
    parent: Range,
    block: Ipv4Net,
}

/// Allocates, imports, validates and releases ranges.
#[derive(Clone)]
pub struct Allocator {
    repository: Arc<dyn RangeRepository>,
    inventory: Option<InventorySource>,
    scope_timeout: Duration,
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field(
                "inventory_scope",
                &self.inventory.as_ref().map(|source| source.scope_id.as_str()),
            )
            .field("scope_timeout", &self.scope_timeout)
            .finish_non_exhaustive()
    }
}

impl Allocator {
    pub fn new(repository: Arc<dyn RangeRepository>) -> Self {
        Self {
            repository,
            inventory: None,
            scope_timeout: DEFAULT_SCOPE_TIMEOUT,
        }
    }

    /// Merge subnets reported by `client` for `scope_id` into every search.
    #[must_use]
    pub fn with_inventory(
        mut self,
        scope_id: impl Into<String>,
        client: Arc<dyn ExternalInventory>,
    ) -> Self {
        self.inventory = Some(InventorySource {
            scope_id: scope_id.into(),
            client,
        });
        self
    }

    #[must_use]
    pub fn with_scope_timeout(mut self, timeout: Duration) -> Self {
        self.scope_timeout = timeout;
        self
    }

    /// The repository backing this allocator
    pub fn repository(&self) -> &Arc<dyn RangeRepository> {
        &self.repository
    }

    /// Allocate the lowest free block of the requested size under the parent.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - no parent given, unknown domain, or a size that does not fit the parent
    /// * `ParentNotFound` - the parent reference does not resolve in the domain
    /// * `NoSpaceAvailable` - the parent has no free block of that size
    /// * `Repository` / `Inventory` - store, lock, timeout or inventory failures
    pub async fn allocate(&self, request: &AllocationRequest) -> Result<Range, IpamError> {
        self.bounded(async {
            let mut scope = self.repository.begin().await?;
            let result = self.allocate_in(scope.as_mut(), request).await;
            finish(scope.as_mut(), result).await
        })
        .await
    }

    /// Compute the block [`allocate`](Self::allocate) would return, then roll back.
    pub async fn preview(&self, request: &AllocationRequest) -> Result<Ipv4Net, IpamError> {
        self.bounded(async {
            let mut scope = self.repository.begin().await?;
            let result = self
                .place_in(scope.as_mut(), request)
                .await
                .map(|placement| placement.block);
            discard(scope.as_mut()).await;
            result
        })
        .await
    }

    /// Record a caller-supplied CIDR as-is. Trusted import path: the block
    /// is normalized but not checked against its parent or siblings.
    pub async fn allocate_explicit(&self, request: &ExplicitRequest) -> Result<Range, IpamError> {
        let block = parse_block(&request.cidr)?;
        self.bounded(async {
            let mut scope = self.repository.begin().await?;
            let result = self.import_in(scope.as_mut(), request, block).await;
            finish(scope.as_mut(), result).await
        })
        .await
    }

    /// Check that `cidr` overlaps no range anywhere in the routing domain,
    /// including external subnets of the domain's networks.
    pub async fn check_overlap(&self, domain: DomainRef, cidr: &str) -> Result<(), IpamError> {
        let candidate = parse_block(cidr)?;
        self.bounded(async {
            let mut scope = self.repository.begin().await?;
            let result = self.check_overlap_in(scope.as_mut(), domain, candidate).await;
            discard(scope.as_mut()).await;
            result
        })
        .await
    }

    /// Delete a range that has no children.
    pub async fn release(&self, id: i64) -> Result<Range, IpamError> {
        self.bounded(async {
            let mut scope = self.repository.begin().await?;
            let result = release_in(scope.as_mut(), id).await;
            finish(scope.as_mut(), result).await
        })
        .await
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, IpamError>>,
    ) -> Result<T, IpamError> {
        match tokio::time::timeout(self.scope_timeout, operation).await {
            Ok(result) => result,
            Err(elapsed) => {
                warn!("Allocation scope exceeded {:?}: {}", self.scope_timeout, elapsed);
                Err(IpamError::Repository(format!(
                    "allocation scope timed out after {:?}",
                    self.scope_timeout
                )))
            }
        }
    }

    async fn allocate_in(
        &self,
        scope: &mut dyn RepositoryScope,
        request: &AllocationRequest,
    ) -> Result<Range, IpamError> {
        let placement = self.place_in(scope, request).await?;
        let new_range = NewRange {
            parent_id: Some(placement.parent.id),
            routing_domain_id: placement.domain.id,
            name: request.name.clone(),
            cidr: placement.block.to_string(),
        };
        let id = scope.insert(new_range.clone()).await?;
        info!(
            "Allocated range {} ({}) under {} in routing domain {}",
            id, new_range.cidr, placement.parent.cidr, placement.domain.name
        );
        Ok(new_range.into_range(id))
    }

    async fn place_in(
        &self,
        scope: &mut dyn RepositoryScope,
        request: &AllocationRequest,
    ) -> Result<Placement, IpamError> {
        let domain = resolve_domain(scope, request.domain).await?;
        let parent_ref = request.parent.as_ref().ok_or_else(|| {
            IpamError::InvalidInput("a parent range is required to allocate".to_string())
        })?;
        let parent = resolve_parent(scope, parent_ref, &domain).await?;
        let parent_block = stored_block(&parent)?;

        let children = scope.list_by_parent(parent.id).await?;
        let occupied = self.occupied_blocks(&domain, &children).await?;
        debug!(
            "Searching /{} in {} with {} occupied blocks",
            request.prefix_len,
            parent_block,
            occupied.len()
        );

        let block = find_next_free_block(request.prefix_len, parent_block, &occupied)?;
        Ok(Placement {
            domain,
            parent,
            block,
        })
    }

    async fn import_in(
        &self,
        scope: &mut dyn RepositoryScope,
        request: &ExplicitRequest,
        block: Ipv4Net,
    ) -> Result<Range, IpamError> {
        let domain = resolve_domain(scope, request.domain).await?;
        let parent_id = match &request.parent {
            Some(parent_ref) => Some(resolve_parent(scope, parent_ref, &domain).await?.id),
            None => None,
        };
        let new_range = NewRange {
            parent_id,
            routing_domain_id: domain.id,
            name: request.name.clone(),
            cidr: block.to_string(),
        };
        let id = scope.insert(new_range.clone()).await?;
        info!(
            "Imported range {} ({}) in routing domain {}",
            id, new_range.cidr, domain.name
        );
        Ok(new_range.into_range(id))
    }

    async fn check_overlap_in(
        &self,
        scope: &mut dyn RepositoryScope,
        domain: DomainRef,
        candidate: Ipv4Net,
    ) -> Result<(), IpamError> {
        let domain = resolve_domain(scope, domain).await?;
        let ranges = scope.list_by_domain(domain.id).await?;
        let occupied = self.occupied_blocks(&domain, &ranges).await?;
        verify_disjoint(occupied, candidate)
    }

    /// Local blocks plus every external primary and secondary block whose
    /// CIDR text is not already among them.
    async fn occupied_blocks(
        &self,
        domain: &RoutingDomain,
        local: &[Range],
    ) -> Result<Vec<Ipv4Net>, IpamError> {
        let mut known: HashSet<&str> = HashSet::with_capacity(local.len());
        let mut occupied = Vec::with_capacity(local.len());
        for range in local {
            occupied.push(stored_block(range)?);
            known.insert(range.cidr.as_str());
        }

        let Some(source) = &self.inventory else {
            return Ok(occupied);
        };
        if domain.vpcs.is_empty() {
            debug!("Routing domain {} has no networks to look up", domain.name);
            return Ok(occupied);
        }

        let external = source
            .client
            .fetch_external_ranges(&source.scope_id, &domain.vpcs)
            .await?;
        let mut merged = 0usize;
        for subnet in &external {
            for cidr in subnet.cidrs() {
                if !known.insert(cidr) {
                    continue;
                }
                let block = parse_block(cidr).map_err(|e| {
                    IpamError::Inventory(format!("subnet {} reports {}", subnet.name, e))
                })?;
                occupied.push(block);
                merged += 1;
            }
        }
        debug!(
            "Merged {} external blocks from {} subnets for routing domain {}",
            merged,
            external.len(),
            domain.name
        );
        Ok(occupied)
    }
}

async fn release_in(scope: &mut dyn RepositoryScope, id: i64) -> Result<Range, IpamError> {
    let range = scope
        .get_by_id(id)
        .await?
        .ok_or_else(|| IpamError::NotFound(format!("range {id}")))?;
    let children = scope.list_by_parent(id).await?;
    if !children.is_empty() {
        return Err(IpamError::InUse(format!(
            "range {} ({}) still has {} child ranges",
            id,
            range.cidr,
            children.len()
        )));
    }
    scope.delete_range(id).await?;
    info!("Released range {} ({})", id, range.cidr);
    Ok(range)
}

async fn resolve_domain(
    scope: &mut dyn RepositoryScope,
    domain: DomainRef,
) -> Result<RoutingDomain, IpamError> {
    match domain {
        DomainRef::Default => scope.default_domain().await?.ok_or_else(|| {
            IpamError::InvalidInput("no routing domain exists to use as default".to_string())
        }),
        DomainRef::Id(id) => scope
            .get_domain(id)
            .await?
            .ok_or_else(|| IpamError::InvalidInput(format!("routing domain {id} does not exist"))),
    }
}

async fn resolve_parent(
    scope: &mut dyn RepositoryScope,
    parent_ref: &RangeRef,
    domain: &RoutingDomain,
) -> Result<Range, IpamError> {
    let parent = match parent_ref {
        RangeRef::Id(id) => scope.get_by_id(*id).await?,
        RangeRef::Cidr(text) => {
            let block = parse_block(text)?;
            scope
                .get_by_cidr_in_domain(&block.to_string(), domain.id)
                .await?
        }
    };
    let parent = parent.ok_or_else(|| IpamError::ParentNotFound(parent_ref.to_string()))?;
    if parent.routing_domain_id != domain.id {
        return Err(IpamError::InvalidInput(format!(
            "parent range {} belongs to routing domain {}, not {}",
            parent.id, parent.routing_domain_id, domain.id
        )));
    }
    Ok(parent)
}

fn stored_block(range: &Range) -> Result<Ipv4Net, IpamError> {
    parse_block(&range.cidr).map_err(|e| {
        IpamError::Repository(format!("range {} has a malformed CIDR: {}", range.id, e))
    })
}

async fn finish<T>(
    scope: &mut dyn RepositoryScope,
    result: Result<T, IpamError>,
) -> Result<T, IpamError> {
    match result {
        Ok(value) => {
            scope.commit().await?;
            Ok(value)
        }
        Err(err) => {
            discard(scope).await;
            Err(err)
        }
    }
}

async fn discard(scope: &mut dyn RepositoryScope) {
    if let Err(err) = scope.rollback().await {
        warn!("Rollback failed: {}", err);
    }
}
