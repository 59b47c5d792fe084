//! Next-free-block search
//!
//! Walks the candidate blocks of the requested size inside a parent in
//! address order and returns the first one that passes
//! [`verify_no_overlap`]. When the conflict is a block larger than the
//! candidate, every candidate up to the end of that block would also fail,
//! so the walk resumes right after it. The lowest free address is still the
//! one returned.

use crate::cidr::{contains, first_block_after, next_sibling, sub_block};
use crate::error::IpamError;
use crate::overlap::verify_no_overlap;
use ipnet::Ipv4Net;
use tracing::debug;

/// Find the lowest-addressed free block of length `prefix_len` in `parent`.
///
/// # Errors
///
/// * `InvalidInput` - `prefix_len` is shorter than or equal to the parent's, or longer than /32
/// * `NoSpaceAvailable` - every candidate collides with `existing`, or an
///   existing block already covers the whole parent
pub fn find_next_free_block(
    prefix_len: u8,
    parent: Ipv4Net,
    existing: &[Ipv4Net],
) -> Result<Ipv4Net, IpamError> {
    let parent = parent.trunc();
    if prefix_len < parent.prefix_len() || prefix_len > 32 {
        return Err(IpamError::InvalidInput(format!(
            "range size /{prefix_len} does not fit in parent {parent}"
        )));
    }

    // A parent already taken in full has no room for any size.
    if existing.iter().any(|block| block.trunc() == parent) {
        return Err(IpamError::NoSpaceAvailable { parent, prefix_len });
    }

    if prefix_len == parent.prefix_len() {
        return Err(IpamError::InvalidInput(format!(
            "range size /{prefix_len} must be smaller than parent {parent}"
        )));
    }

    let mut candidate = sub_block(parent, prefix_len, 0)?;
    loop {
        let conflict = match verify_no_overlap(parent, existing, candidate) {
            Ok(()) => {
                debug!("Found free block {} in {}", candidate, parent);
                return Ok(candidate);
            }
            Err(IpamError::OverlapDetected { conflict, .. }) => conflict,
            Err(other) => return Err(other),
        };

        let next = if conflict.prefix_len() < prefix_len {
            first_block_after(conflict, prefix_len)
        } else {
            next_sibling(candidate)
        };

        match next {
            Some(block) if contains(parent, block) => candidate = block,
            _ => return Err(IpamError::NoSpaceAvailable { parent, prefix_len }),
        }
    }
}
