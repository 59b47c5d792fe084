//! IPAM Autopilot resource types
//!
//! Typed views of the Config Connector resources the admission webhooks
//! inspect, plus the `ipam.cloud.google.com/*` annotations that drive
//! allocation and release.

pub mod annotations;
pub mod compute_subnetwork;

pub use annotations::*;
pub use compute_subnetwork::*;
