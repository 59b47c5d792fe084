//! IPAM errors

use ipnet::Ipv4Net;
use thiserror::Error;

/// Errors produced by range arithmetic, the allocation search and the
/// repository/inventory seams.
#[derive(Debug, Error)]
pub enum IpamError {
    /// Text that is not an IPv4 `address/prefix` block
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    /// Missing or inconsistent request input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A sub-block was requested with a prefix that is not longer than its parent's
    #[error("Prefix /{requested} must be longer than parent prefix /{parent}")]
    PrefixTooSmall { parent: u8, requested: u8 },

    /// Candidate block collides with an occupied block
    #[error("{candidate} overlaps with {conflict}")]
    OverlapDetected { candidate: Ipv4Net, conflict: Ipv4Net },

    /// Candidate block is not inside the parent block
    #[error("{candidate} is not contained in {parent}")]
    NotContained { candidate: Ipv4Net, parent: Ipv4Net },

    /// Every candidate of the requested size is occupied
    #[error("No address range available in parent {parent} for a /{prefix_len}")]
    NoSpaceAvailable { parent: Ipv4Net, prefix_len: u8 },

    /// Referenced parent range does not exist
    #[error("Parent range not found: {0}")]
    ParentNotFound(String),

    /// Referenced range or routing domain does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource still has dependents
    #[error("Still in use: {0}")]
    InUse(String),

    /// Store unavailable, lock or scope timeout, constraint failure
    #[error("Repository error: {0}")]
    Repository(String),

    /// External inventory query failed or returned unusable data
    #[error("Inventory error: {0}")]
    Inventory(String),
}

impl IpamError {
    /// Whether the failure was caused by the caller's input.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            IpamError::InvalidCidr(_)
                | IpamError::InvalidInput(_)
                | IpamError::PrefixTooSmall { .. }
                | IpamError::ParentNotFound(_)
                | IpamError::OverlapDetected { .. }
                | IpamError::NotContained { .. }
        )
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, IpamError::Repository(_) | IpamError::Inventory(_))
    }
}
