//! IPAM Autopilot core
//!
//! Hierarchical IPv4 range allocation. Ranges form a forest of CIDR blocks
//! grouped into routing domains; a new child range is the lowest free block
//! of the requested size under its parent that collides neither with its
//! siblings nor with subnets reported by an external inventory.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ipam_core::{Allocator, AllocationRequest, DomainRef, RangeRef, RangeRepository};
//!
//! # async fn example(repository: Arc<dyn RangeRepository>) -> Result<(), ipam_core::IpamError> {
//! let allocator = Allocator::new(repository);
//! let range = allocator
//!     .allocate(&AllocationRequest {
//!         parent: Some(RangeRef::parse("10.0.0.0/8")),
//!         domain: DomainRef::Default,
//!         prefix_len: 24,
//!         name: "team-a".to_string(),
//!     })
//!     .await?;
//! println!("{} -> {}", range.id, range.cidr);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **cidr**: block parsing and arithmetic
//! - **overlap**: disjointness checks
//! - **search**: next-free-block search
//! - **repository** / **inventory**: storage and external-subnet seams
//! - **allocator**: the transactional use cases built on top

pub mod allocator;
pub mod cidr;
pub mod error;
pub mod inventory;
pub mod model;
pub mod overlap;
pub mod repository;
pub mod search;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;


pub use allocator::{AllocationRequest, Allocator, ExplicitRequest, DEFAULT_SCOPE_TIMEOUT};
pub use cidr::{contains, next_sibling, overlaps, parse_block, sub_block};
pub use error::IpamError;
pub use inventory::ExternalInventory;
pub use model::*;
pub use overlap::{verify_disjoint, verify_no_overlap};
pub use repository::{RangeRepository, RepositoryScope};
pub use search::find_next_free_block;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{InMemoryRepository, StaticInventory};

pub use ipnet::Ipv4Net;
