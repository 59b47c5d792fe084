//! PostgreSQL implementation of the range repository
//!
//! A scope is one transaction. Every read made through it takes row locks
//! (`FOR UPDATE`), so two allocations under the same parent queue on the
//! parent row and the second one sees the first one's child once it runs.
//! `lock_timeout` is set per transaction so a stuck holder turns into a
//! repository error instead of an unbounded wait.

use crate::error::store_error;
use ipam_core::{
    IpamError, NewRange, NewRoutingDomain, Range, RangeRepository, RepositoryScope,
    RoutingDomain, RoutingDomainUpdate,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

type DomainRow = (i64, String, Vec<String>);
type RangeRow = (i64, Option<i64>, i64, String, String);

const DOMAIN_COLUMNS: &str = "routing_domain_id, name, vpcs";
const RANGE_COLUMNS: &str = "subnet_id, parent_id, routing_domain_id, name, cidr";

/// Default per-transaction lock timeout
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

fn domain_from_row((id, name, vpcs): DomainRow) -> RoutingDomain {
    RoutingDomain { id, name, vpcs }
}

fn range_from_row((id, parent_id, routing_domain_id, name, cidr): RangeRow) -> Range {
    Range {
        id,
        parent_id,
        routing_domain_id,
        name,
        cidr,
    }
}

/// Range repository backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgRepository {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Connect a new pool
    ///
    /// # Arguments
    /// * `database_url` - `postgres://` connection string
    /// * `max_connections` - pool size
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, IpamError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| store_error("connect", e))?;
        info!("Connected to database with up to {} connections", max_connections);
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl RangeRepository for PgRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryScope>, IpamError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin", e))?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("set lock_timeout", e))?;
        Ok(Box::new(PgScope { tx: Some(tx) }))
    }

    async fn list_domains(&self) -> Result<Vec<RoutingDomain>, IpamError> {
        let rows: Vec<DomainRow> = sqlx::query_as(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM routing_domains ORDER BY routing_domain_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("list routing domains", e))?;
        Ok(rows.into_iter().map(domain_from_row).collect())
    }

    async fn get_domain(&self, id: i64) -> Result<RoutingDomain, IpamError> {
        let row: Option<DomainRow> = sqlx::query_as(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM routing_domains WHERE routing_domain_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("get routing domain", e))?;
        row.map(domain_from_row)
            .ok_or_else(|| IpamError::NotFound(format!("routing domain {id}")))
    }

    async fn create_domain(&self, domain: NewRoutingDomain) -> Result<RoutingDomain, IpamError> {
        let row: DomainRow = sqlx::query_as(&format!(
            "INSERT INTO routing_domains (name, vpcs) VALUES ($1, $2) RETURNING {DOMAIN_COLUMNS}"
        ))
        .bind(&domain.name)
        .bind(&domain.vpcs)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("create routing domain", e))?;
        debug!("Created routing domain {} ({})", row.0, row.1);
        Ok(domain_from_row(row))
    }

    async fn update_domain(
        &self,
        id: i64,
        update: RoutingDomainUpdate,
    ) -> Result<RoutingDomain, IpamError> {
        let row: Option<DomainRow> = sqlx::query_as(&format!(
            "UPDATE routing_domains SET name = COALESCE($2, name), vpcs = COALESCE($3, vpcs) \
             WHERE routing_domain_id = $1 RETURNING {DOMAIN_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.vpcs)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("update routing domain", e))?;
        row.map(domain_from_row)
            .ok_or_else(|| IpamError::NotFound(format!("routing domain {id}")))
    }

    async fn delete_domain(&self, id: i64) -> Result<(), IpamError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin", e))?;

        let locked: Option<(i64,)> = sqlx::query_as(
            "SELECT routing_domain_id FROM routing_domains WHERE routing_domain_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| store_error("lock routing domain", e))?;
        if locked.is_none() {
            return Err(IpamError::NotFound(format!("routing domain {id}")));
        }

        let (owned,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subnets WHERE routing_domain_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| store_error("count ranges", e))?;
        if owned > 0 {
            return Err(IpamError::InUse(format!(
                "routing domain {id} still owns {owned} ranges"
            )));
        }

        sqlx::query("DELETE FROM routing_domains WHERE routing_domain_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("delete routing domain", e))?;
        tx.commit()
            .await
            .map_err(|e| store_error("commit", e))
    }

    async fn list_ranges(&self) -> Result<Vec<Range>, IpamError> {
        let rows: Vec<RangeRow> =
            sqlx::query_as(&format!("SELECT {RANGE_COLUMNS} FROM subnets ORDER BY subnet_id"))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| store_error("list ranges", e))?;
        Ok(rows.into_iter().map(range_from_row).collect())
    }

    async fn get_range(&self, id: i64) -> Result<Range, IpamError> {
        let row: Option<RangeRow> =
            sqlx::query_as(&format!("SELECT {RANGE_COLUMNS} FROM subnets WHERE subnet_id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("get range", e))?;
        row.map(range_from_row)
            .ok_or_else(|| IpamError::NotFound(format!("range {id}")))
    }
}

/// One transaction
struct PgScope {
    tx: Option<Transaction<'static, Postgres>>,
}

impl fmt::Debug for PgScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgScope")
            .field("open", &self.tx.is_some())
            .finish()
    }
}

impl PgScope {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, IpamError> {
        self.tx
            .as_mut()
            .ok_or_else(|| IpamError::Repository("transaction already finished".to_string()))
    }

    async fn fetch_domain(
        &mut self,
        sql: &str,
        id: Option<i64>,
    ) -> Result<Option<RoutingDomain>, IpamError> {
        let tx = self.tx()?;
        let mut query = sqlx::query_as::<_, DomainRow>(sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let row = query
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| store_error("lock routing domain", e))?;
        Ok(row.map(domain_from_row))
    }

    async fn fetch_ranges(
        &mut self,
        operation: &str,
        sql: &str,
        id: i64,
    ) -> Result<Vec<Range>, IpamError> {
        let tx = self.tx()?;
        let rows: Vec<RangeRow> = sqlx::query_as(sql)
            .bind(id)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| store_error(operation, e))?;
        Ok(rows.into_iter().map(range_from_row).collect())
    }
}

#[async_trait::async_trait]
impl RepositoryScope for PgScope {
    async fn default_domain(&mut self) -> Result<Option<RoutingDomain>, IpamError> {
        self.fetch_domain(
            &format!(
                "SELECT {DOMAIN_COLUMNS} FROM routing_domains \
                 ORDER BY routing_domain_id LIMIT 1 FOR UPDATE"
            ),
            None,
        )
        .await
    }

    async fn get_domain(&mut self, id: i64) -> Result<Option<RoutingDomain>, IpamError> {
        self.fetch_domain(
            &format!(
                "SELECT {DOMAIN_COLUMNS} FROM routing_domains \
                 WHERE routing_domain_id = $1 FOR UPDATE"
            ),
            Some(id),
        )
        .await
    }

    async fn get_by_id(&mut self, id: i64) -> Result<Option<Range>, IpamError> {
        let tx = self.tx()?;
        let row: Option<RangeRow> = sqlx::query_as(&format!(
            "SELECT {RANGE_COLUMNS} FROM subnets WHERE subnet_id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| store_error("lock range", e))?;
        Ok(row.map(range_from_row))
    }

    async fn get_by_cidr_in_domain(
        &mut self,
        cidr: &str,
        domain_id: i64,
    ) -> Result<Option<Range>, IpamError> {
        let tx = self.tx()?;
        let row: Option<RangeRow> = sqlx::query_as(&format!(
            "SELECT {RANGE_COLUMNS} FROM subnets \
             WHERE cidr = $1 AND routing_domain_id = $2 \
             ORDER BY subnet_id LIMIT 1 FOR UPDATE"
        ))
        .bind(cidr)
        .bind(domain_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| store_error("lock range by cidr", e))?;
        Ok(row.map(range_from_row))
    }

    async fn list_by_parent(&mut self, parent_id: i64) -> Result<Vec<Range>, IpamError> {
        self.fetch_ranges(
            "lock child ranges",
            &format!("SELECT {RANGE_COLUMNS} FROM subnets WHERE parent_id = $1 FOR UPDATE"),
            parent_id,
        )
        .await
    }

    async fn list_by_domain(&mut self, domain_id: i64) -> Result<Vec<Range>, IpamError> {
        self.fetch_ranges(
            "lock domain ranges",
            &format!(
                "SELECT {RANGE_COLUMNS} FROM subnets WHERE routing_domain_id = $1 FOR UPDATE"
            ),
            domain_id,
        )
        .await
    }

    async fn insert(&mut self, range: NewRange) -> Result<i64, IpamError> {
        let tx = self.tx()?;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO subnets (parent_id, routing_domain_id, name, cidr) \
             VALUES ($1, $2, $3, $4) RETURNING subnet_id",
        )
        .bind(range.parent_id)
        .bind(range.routing_domain_id)
        .bind(&range.name)
        .bind(&range.cidr)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| store_error("insert range", e))?;
        Ok(id)
    }

    async fn delete_range(&mut self, id: i64) -> Result<(), IpamError> {
        let tx = self.tx()?;
        let result = sqlx::query("DELETE FROM subnets WHERE subnet_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| store_error("delete range", e))?;
        if result.rows_affected() == 0 {
            return Err(IpamError::NotFound(format!("range {id}")));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), IpamError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| IpamError::Repository("transaction already finished".to_string()))?;
        tx.commit().await.map_err(|e| store_error("commit", e))
    }

    async fn rollback(&mut self) -> Result<(), IpamError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(|e| store_error("rollback", e)),
            None => Ok(()),
        }
    }
}
