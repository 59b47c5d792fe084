//! PostgreSQL storage for IPAM Autopilot
//!
//! Implements [`ipam_core::RangeRepository`] over two tables,
//! `routing_domains` and `subnets` (see `schema.sql`). CIDRs are stored as
//! normalized text and a domain's networks as a `TEXT[]`.

mod error;
pub mod repository;

pub use repository::{PgRepository, DEFAULT_LOCK_TIMEOUT};

/// Table definitions expected by [`PgRepository`]
pub const SCHEMA: &str = include_str!("../schema.sql");
