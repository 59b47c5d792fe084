//! In-memory repository for unit testing
//!
//! [`InMemoryRepository`] keeps every domain and range behind one async
//! mutex. A scope holds that mutex for its whole lifetime and works on a
//! staged copy of the state, so scopes are fully serialized and a scope
//! that is dropped or rolled back leaves nothing behind.
//!
//! [`StaticInventory`] returns a fixed list of external subnets.

use crate::error::IpamError;
use crate::inventory::ExternalInventory;
use crate::model::{
    ExternalRange, NewRange, NewRoutingDomain, Range, RoutingDomain, RoutingDomainUpdate,
};
use crate::repository::{RangeRepository, RepositoryScope};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct State {
    domains: BTreeMap<i64, RoutingDomain>,
    ranges: BTreeMap<i64, Range>,
    last_domain_id: i64,
    last_range_id: i64,
}

impl State {
    fn insert_range(&mut self, range: NewRange) -> i64 {
        self.last_range_id += 1;
        let id = self.last_range_id;
        self.ranges.insert(id, range.into_range(id));
        id
    }

    fn children_of(&self, parent_id: i64) -> Vec<Range> {
        self.ranges
            .values()
            .filter(|range| range.parent_id == Some(parent_id))
            .cloned()
            .collect()
    }
}

/// Mock repository for testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
    fail_inserts: Arc<AtomicBool>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a routing domain (for test setup)
    pub async fn add_domain(&self, name: &str, vpcs: &[&str]) -> RoutingDomain {
        let mut state = self.state.lock().await;
        state.last_domain_id += 1;
        let domain = RoutingDomain {
            id: state.last_domain_id,
            name: name.to_string(),
            vpcs: vpcs.iter().map(|vpc| (*vpc).to_string()).collect(),
        };
        state.domains.insert(domain.id, domain.clone());
        domain
    }

    /// Add a range without any checks (for test setup)
    pub async fn add_range(
        &self,
        parent_id: Option<i64>,
        routing_domain_id: i64,
        name: &str,
        cidr: &str,
    ) -> Range {
        let mut state = self.state.lock().await;
        let id = state.insert_range(NewRange {
            parent_id,
            routing_domain_id,
            name: name.to_string(),
            cidr: cidr.to_string(),
        });
        state.ranges[&id].clone()
    }

    /// Make every scoped insert fail with a repository error
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all committed ranges, ordered by id
    pub async fn ranges(&self) -> Vec<Range> {
        self.state.lock().await.ranges.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl RangeRepository for InMemoryRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryScope>, IpamError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryScope {
            guard: Some(guard),
            staged,
            fail_inserts: self.fail_inserts.load(Ordering::SeqCst),
        }))
    }

    async fn list_domains(&self) -> Result<Vec<RoutingDomain>, IpamError> {
        Ok(self.state.lock().await.domains.values().cloned().collect())
    }

    async fn get_domain(&self, id: i64) -> Result<RoutingDomain, IpamError> {
        self.state
            .lock()
            .await
            .domains
            .get(&id)
            .cloned()
            .ok_or_else(|| IpamError::NotFound(format!("routing domain {id}")))
    }

    async fn create_domain(&self, domain: NewRoutingDomain) -> Result<RoutingDomain, IpamError> {
        let vpcs: Vec<&str> = domain.vpcs.iter().map(String::as_str).collect();
        Ok(self.add_domain(&domain.name, &vpcs).await)
    }

    async fn update_domain(
        &self,
        id: i64,
        update: RoutingDomainUpdate,
    ) -> Result<RoutingDomain, IpamError> {
        let mut state = self.state.lock().await;
        let domain = state
            .domains
            .get_mut(&id)
            .ok_or_else(|| IpamError::NotFound(format!("routing domain {id}")))?;
        if let Some(name) = update.name {
            domain.name = name;
        }
        if let Some(vpcs) = update.vpcs {
            domain.vpcs = vpcs;
        }
        Ok(domain.clone())
    }

    async fn delete_domain(&self, id: i64) -> Result<(), IpamError> {
        let mut state = self.state.lock().await;
        if !state.domains.contains_key(&id) {
            return Err(IpamError::NotFound(format!("routing domain {id}")));
        }
        let owned = state
            .ranges
            .values()
            .filter(|range| range.routing_domain_id == id)
            .count();
        if owned > 0 {
            return Err(IpamError::InUse(format!(
                "routing domain {id} still owns {owned} ranges"
            )));
        }
        state.domains.remove(&id);
        Ok(())
    }

    async fn list_ranges(&self) -> Result<Vec<Range>, IpamError> {
        Ok(self.ranges().await)
    }

    async fn get_range(&self, id: i64) -> Result<Range, IpamError> {
        self.state
            .lock()
            .await
            .ranges
            .get(&id)
            .cloned()
            .ok_or_else(|| IpamError::NotFound(format!("range {id}")))
    }
}

#[derive(Debug)]
struct InMemoryScope {
    guard: Option<OwnedMutexGuard<State>>,
    staged: State,
    fail_inserts: bool,
}

impl InMemoryScope {
    fn ensure_open(&self) -> Result<(), IpamError> {
        if self.guard.is_some() {
            Ok(())
        } else {
            Err(IpamError::Repository("scope already closed".to_string()))
        }
    }
}

#[async_trait::async_trait]
impl RepositoryScope for InMemoryScope {
    async fn default_domain(&mut self) -> Result<Option<RoutingDomain>, IpamError> {
        self.ensure_open()?;
        Ok(self.staged.domains.values().next().cloned())
    }

    async fn get_domain(&mut self, id: i64) -> Result<Option<RoutingDomain>, IpamError> {
        self.ensure_open()?;
        Ok(self.staged.domains.get(&id).cloned())
    }

    async fn get_by_id(&mut self, id: i64) -> Result<Option<Range>, IpamError> {
        self.ensure_open()?;
        Ok(self.staged.ranges.get(&id).cloned())
    }

    async fn get_by_cidr_in_domain(
        &mut self,
        cidr: &str,
        domain_id: i64,
    ) -> Result<Option<Range>, IpamError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .ranges
            .values()
            .find(|range| range.routing_domain_id == domain_id && range.cidr == cidr)
            .cloned())
    }

    async fn list_by_parent(&mut self, parent_id: i64) -> Result<Vec<Range>, IpamError> {
        self.ensure_open()?;
        Ok(self.staged.children_of(parent_id))
    }

    async fn list_by_domain(&mut self, domain_id: i64) -> Result<Vec<Range>, IpamError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .ranges
            .values()
            .filter(|range| range.routing_domain_id == domain_id)
            .cloned()
            .collect())
    }

    async fn insert(&mut self, range: NewRange) -> Result<i64, IpamError> {
        self.ensure_open()?;
        if self.fail_inserts {
            return Err(IpamError::Repository("insert rejected".to_string()));
        }
        Ok(self.staged.insert_range(range))
    }

    async fn delete_range(&mut self, id: i64) -> Result<(), IpamError> {
        self.ensure_open()?;
        self.staged
            .ranges
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| IpamError::NotFound(format!("range {id}")))
    }

    async fn commit(&mut self) -> Result<(), IpamError> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| IpamError::Repository("scope already closed".to_string()))?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), IpamError> {
        self.guard = None;
        Ok(())
    }
}

/// Inventory that always reports the same subnets, filtered by network
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    ranges: Vec<ExternalRange>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl StaticInventory {
    pub fn new(ranges: Vec<ExternalRange>) -> Self {
        Self {
            ranges,
            ..Self::default()
        }
    }

    /// Inventory whose every lookup fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ExternalInventory for StaticInventory {
    async fn fetch_external_ranges(
        &self,
        _scope_id: &str,
        networks: &[String],
    ) -> Result<Vec<ExternalRange>, IpamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(IpamError::Inventory("inventory unavailable".to_string()));
        }
        Ok(self
            .ranges
            .iter()
            .filter(|range| networks.contains(&range.network))
            .cloned()
            .collect())
    }
}
