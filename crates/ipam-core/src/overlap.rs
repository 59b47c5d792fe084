//! Overlap checking between a candidate block and occupied blocks

use crate::cidr::{contains, overlaps};
use crate::error::IpamError;
use ipnet::Ipv4Net;

/// Verify that `candidate` lies in `parent` and is disjoint from every
/// occupied block that itself lies in `parent`.
///
/// Blocks outside `parent`, including blocks that contain it, are ignored.
/// Success or failure does not depend on the order of `existing`; on failure
/// the first conflicting block encountered is reported.
pub fn verify_no_overlap(
    parent: Ipv4Net,
    existing: &[Ipv4Net],
    candidate: Ipv4Net,
) -> Result<(), IpamError> {
    if !contains(parent, candidate) {
        return Err(IpamError::NotContained { candidate, parent });
    }

    verify_disjoint(
        existing.iter().copied().filter(|block| contains(parent, *block)),
        candidate,
    )
}

/// Verify that `candidate` shares no address with any block in `occupied`,
/// wherever those blocks sit.
pub fn verify_disjoint(
    occupied: impl IntoIterator<Item = Ipv4Net>,
    candidate: Ipv4Net,
) -> Result<(), IpamError> {
    match occupied.into_iter().find(|block| overlaps(*block, candidate)) {
        Some(conflict) => Err(IpamError::OverlapDetected { candidate, conflict }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(text: &str) -> Ipv4Net {
        text.parse().unwrap()
    }

    #[test]
    fn test_disjoint_candidate_passes() {
        let parent = net("10.0.0.0/8");
        let existing = [net("10.0.0.0/26"), net("10.0.1.0/24")];
        assert!(verify_no_overlap(parent, &existing, net("10.0.0.64/26")).is_ok());
    }

    #[test]
    fn test_overlap_names_conflict() {
        let parent = net("10.0.0.0/8");
        let existing = [net("10.0.0.0/26"), net("10.0.1.0/24")];
        match verify_no_overlap(parent, &existing, net("10.0.1.128/25")) {
            Err(IpamError::OverlapDetected { candidate, conflict }) => {
                assert_eq!(candidate, net("10.0.1.128/25"));
                assert_eq!(conflict, net("10.0.1.0/24"));
            }
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[test]
    fn test_blocks_outside_parent_are_ignored() {
        let parent = net("10.1.0.0/16");
        // The parent's own parent and an unrelated block
        let existing = [net("10.0.0.0/8"), net("192.168.0.0/16")];
        assert!(verify_no_overlap(parent, &existing, net("10.1.0.0/24")).is_ok());
    }

    #[test]
    fn test_candidate_outside_parent_fails() {
        let parent = net("10.1.0.0/16");
        assert!(matches!(
            verify_no_overlap(parent, &[], net("10.2.0.0/24")),
            Err(IpamError::NotContained { .. })
        ));
    }

    #[test]
    fn test_verify_disjoint_spans_everything() {
        let occupied = [net("10.0.0.0/8"), net("192.168.0.0/16")];
        assert!(matches!(
            verify_disjoint(occupied, net("10.2.0.0/16")),
            Err(IpamError::OverlapDetected { .. })
        ));
        assert!(verify_disjoint(occupied, net("172.16.0.0/12")).is_ok());
    }

    #[test]
    fn test_result_independent_of_order() {
        let parent = net("172.16.0.0/12");
        let mut existing = vec![
            net("172.16.0.0/24"),
            net("172.16.4.0/22"),
            net("172.17.0.0/16"),
            net("172.16.1.0/28"),
            net("10.0.0.0/8"),
        ];
        let candidates = [
            net("172.16.0.0/23"),
            net("172.16.2.0/23"),
            net("172.16.5.0/24"),
            net("172.18.0.0/16"),
            net("172.16.1.16/28"),
        ];
        let baseline: Vec<bool> = candidates
            .iter()
            .map(|c| verify_no_overlap(parent, &existing, *c).is_ok())
            .collect();
        assert_eq!(baseline, vec![false, true, false, true, true]);

        for rotation in 1..existing.len() {
            existing.rotate_left(rotation);
            let outcome: Vec<bool> = candidates
                .iter()
                .map(|c| verify_no_overlap(parent, &existing, *c).is_ok())
                .collect();
            assert_eq!(outcome, baseline);
        }
        existing.reverse();
        let outcome: Vec<bool> = candidates
            .iter()
            .map(|c| verify_no_overlap(parent, &existing, *c).is_ok())
            .collect();
        assert_eq!(outcome, baseline);
    }
}
