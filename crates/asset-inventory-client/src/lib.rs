//! Cloud Asset Inventory REST Client
//!
//! A small client for the Cloud Asset Inventory `ListAssets` API, used to
//! discover VPC subnetworks that were created outside IPAM Autopilot.
//!
//! # Example
//!
//! ```no_run
//! use asset_inventory_client::{AssetInventoryClient, TokenSource, DEFAULT_BASE_URL};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AssetInventoryClient::new(DEFAULT_BASE_URL.to_string(), TokenSource::metadata())?;
//!
//! let networks = vec![
//!     "https://www.googleapis.com/compute/v1/projects/host/global/networks/shared".to_string(),
//! ];
//! for subnet in client.list_subnetworks("organizations/123456", &networks).await? {
//!     println!("{} {}", subnet.name, subnet.ip_cidr_range);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Pagination**: follows `nextPageToken` until the last page
//! - **Retry Logic**: transient failures are retried with Fibonacci backoff
//! - **Tokens**: static bearer token or the metadata server

pub mod backoff;
pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod inventory_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{AssetInventoryClient, DEFAULT_BASE_URL};
pub use common::{HttpClient, TokenSource, DEFAULT_MAX_ATTEMPTS};
pub use error::InventoryError;
pub use models::*;
pub use inventory_trait::AssetInventoryClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockAssetInventoryClient;
