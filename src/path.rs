//! Half-path walking and splicing for path approximation.

use crate::error::{OracleError, Result};
use crate::topology::Asn;
use std::collections::HashMap;

/// Follows `next_hop` from `start` until `target`, both included.
///
/// The walk is bounded by `max_steps`; running past it (a next-hop cycle)
/// or hitting a node with no next hop is an invariant violation.
pub fn trace<F>(start: Asn, target: Asn, max_steps: usize, mut next_hop: F) -> Result<Vec<Asn>>
where
    F: FnMut(Asn) -> Option<Asn>,
{
    let mut walk = vec![start];
    let mut current = start;
    while current != target {
        if walk.len() > max_steps {
            return Err(OracleError::invariant(format!(
                "walk from AS{} toward AS{} exceeds {} steps",
                start, target, max_steps
            )));
        }
        let next = next_hop(current).ok_or_else(|| {
            OracleError::invariant(format!(
                "AS{} has no next hop toward AS{}",
                current, target
            ))
        })?;
        if next == current {
            return Err(OracleError::invariant(format!(
                "AS{} points to itself while walking toward AS{}",
                current, target
            )));
        }
        walk.push(next);
        current = next;
    }
    Ok(walk)
}

/// Joins the walks `near → root` and `far → root` into `near → far`.
///
/// Both walks end at the same root. They are scanned in lockstep and cut
/// at the first node seen by both: the near side keeps it, the far side
/// stops just before it.
pub fn splice(near: &[Asn], far: &[Asn]) -> Vec<Asn> {
    let (near_cut, far_cut) = meeting_point(near, far);
    let mut path: Vec<Asn> = near[..=near_cut].to_vec();
    path.extend(far[..far_cut].iter().rev());
    path
}

/// Indices in `near` and `far` of the first node common to both walks in an
/// interleaved scan.
fn meeting_point(near: &[Asn], far: &[Asn]) -> (usize, usize) {
    let mut seen_near: HashMap<Asn, usize> = HashMap::new();
    let mut seen_far: HashMap<Asn, usize> = HashMap::new();

    for step in 0..near.len().max(far.len()) {
        if let Some(&asn) = near.get(step) {
            if let Some(&far_idx) = seen_far.get(&asn) {
                return (step, far_idx);
            }
            seen_near.insert(asn, step);
        }
        if let Some(&asn) = far.get(step) {
            if let Some(&near_idx) = seen_near.get(&asn) {
                return (near_idx, step);
            }
            seen_far.insert(asn, step);
        }
    }

    // walks that share nothing: join at the end of each
    (near.len().saturating_sub(1), far.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_follows_hops() {
        let hops: HashMap<Asn, Asn> = [(1, 2), (2, 3), (3, 4)].into_iter().collect();
        let walk = trace(1, 4, 10, |asn| hops.get(&asn).copied()).unwrap();
        assert_eq!(walk, vec![1, 2, 3, 4]);
        assert_eq!(trace(4, 4, 10, |_| None).unwrap(), vec![4]);
    }

    #[test]
    fn test_trace_detects_cycles() {
        let hops: HashMap<Asn, Asn> = [(1, 2), (2, 1)].into_iter().collect();
        let err = trace(1, 9, 5, |asn| hops.get(&asn).copied()).unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(trace(1, 9, 5, |_| None).is_err());
    }

    #[test]
    fn test_splice_disjoint_walks() {
        // 1 -> 2 -> 5 and 4 -> 3 -> 5
        assert_eq!(splice(&[1, 2, 5], &[4, 3, 5]), vec![1, 2, 5, 3, 4]);
    }

    #[test]
    fn test_splice_cuts_shared_tail() {
        // walks merge at 3 before reaching the root 5
        assert_eq!(splice(&[1, 3, 4, 5], &[2, 3, 4, 5]), vec![1, 3, 2]);
    }

    #[test]
    fn test_splice_root_is_endpoint() {
        // far endpoint is the root itself
        assert_eq!(splice(&[1, 2, 3], &[3]), vec![1, 2, 3]);
        // near endpoint is the root itself
        assert_eq!(splice(&[3], &[1, 2, 3]), vec![3, 2, 1]);
    }

    #[test]
    fn test_splice_far_walk_passes_near_origin() {
        // far walk runs through the near origin
        assert_eq!(splice(&[1, 5, 6], &[3, 2, 1, 5, 6]), vec![1, 2, 3]);
    }
}
