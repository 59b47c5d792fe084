//! IPv4 block arithmetic
//!
//! Pure helpers over [`Ipv4Net`]. Addresses are treated as offsets in the
//! 32-bit unsigned space; sizes and end offsets are widened to `u64` so a
//! `/0` block does not overflow.

use crate::error::IpamError;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Parse `a.b.c.d/len` into a block, masking host bits off the address.
pub fn parse_block(text: &str) -> Result<Ipv4Net, IpamError> {
    let trimmed = text.trim();
    trimmed
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|e| IpamError::InvalidCidr(format!("{trimmed}: {e}")))
}

/// The `index`-th block of length `new_prefix` inside `parent`.
pub fn sub_block(parent: Ipv4Net, new_prefix: u8, index: u32) -> Result<Ipv4Net, IpamError> {
    let parent_prefix = parent.prefix_len();
    if new_prefix <= parent_prefix {
        return Err(IpamError::PrefixTooSmall {
            parent: parent_prefix,
            requested: new_prefix,
        });
    }
    if new_prefix > 32 {
        return Err(IpamError::InvalidInput(format!(
            "prefix length /{new_prefix} exceeds /32"
        )));
    }

    let count = 1u64 << (new_prefix - parent_prefix);
    if u64::from(index) >= count {
        return Err(IpamError::InvalidInput(format!(
            "index {index} is out of range for a /{new_prefix} inside {parent}"
        )));
    }

    let start = block_start(parent) + u64::from(index) * size_of_prefix(new_prefix);
    block_at(start, new_prefix).ok_or_else(|| {
        IpamError::InvalidInput(format!("/{new_prefix} #{index} of {parent} is outside IPv4"))
    })
}

/// The block of the same length immediately after `block`, or `None` once
/// the address space is exhausted.
pub fn next_sibling(block: Ipv4Net) -> Option<Ipv4Net> {
    block_at(block_end(block), block.prefix_len())
}

/// First block of length `prefix_len` starting at or after the end of `block`.
///
/// Only meaningful when `prefix_len` is at least `block`'s prefix length, so
/// that the end of `block` is aligned for the smaller block size.
pub(crate) fn first_block_after(block: Ipv4Net, prefix_len: u8) -> Option<Ipv4Net> {
    block_at(block_end(block), prefix_len)
}

/// Whether every address of `inner` lies in `outer`.
pub fn contains(outer: Ipv4Net, inner: Ipv4Net) -> bool {
    outer.prefix_len() <= inner.prefix_len()
        && block_start(inner) >= block_start(outer)
        && block_end(inner) <= block_end(outer)
}

/// Whether `a` and `b` share at least one address.
pub fn overlaps(a: Ipv4Net, b: Ipv4Net) -> bool {
    block_start(a) < block_end(b) && block_start(b) < block_end(a)
}

fn size_of_prefix(prefix_len: u8) -> u64 {
    1u64 << (32 - u32::from(prefix_len))
}

fn block_start(block: Ipv4Net) -> u64 {
    u64::from(u32::from(block.network()))
}

// Exclusive
fn block_end(block: Ipv4Net) -> u64 {
    block_start(block) + size_of_prefix(block.prefix_len())
}

fn block_at(start: u64, prefix_len: u8) -> Option<Ipv4Net> {
    let start = u32::try_from(start).ok()?;
    Ipv4Net::new(Ipv4Addr::from(start), prefix_len).ok()
}
