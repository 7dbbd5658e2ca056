//! Hop-depth profile of the nodes touched by a repair, measured from the
//! endpoints of the deleted link.

use crate::frontier::EDGE_WEIGHT;
use crate::topology::Asn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Estimated BFS depth of each touched node from the deletion point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceProfile {
    depths: BTreeMap<Asn, u32>,
}

impl DistanceProfile {
    /// Profile rooted at a single node.
    pub fn from_origin(origin: Asn) -> Self {
        let mut depths = BTreeMap::new();
        depths.insert(origin, 0);
        Self { depths }
    }

    /// Profile rooted at both endpoints of a deleted link.
    pub fn from_link(a: Asn, b: Asn) -> Self {
        let mut profile = Self::from_origin(a);
        profile.depths.insert(b, 0);
        profile
    }

    /// Records `to` one hop past `from`, keeping the smaller estimate.
    /// Returns false when `from` has not been measured.
    pub fn extend(&mut self, from: Asn, to: Asn) -> bool {
        match self.depths.get(&from).copied() {
            Some(depth) => {
                self.approach(to, depth + EDGE_WEIGHT);
                true
            }
            None => false,
        }
    }

    fn approach(&mut self, asn: Asn, depth: u32) {
        self.depths
            .entry(asn)
            .and_modify(|current| *current = (*current).min(depth))
            .or_insert(depth);
    }

    /// Best estimate for every node measured by either profile.
    pub fn combine(&mut self, other: &DistanceProfile) {
        for (&asn, &depth) in &other.depths {
            self.approach(asn, depth);
        }
    }

    pub fn depth(&self, asn: Asn) -> Option<u32> {
        self.depths.get(&asn).copied()
    }

    pub fn mean(&self) -> f64 {
        if self.depths.is_empty() {
            return 0.0;
        }
        let total: u64 = self.depths.values().map(|&d| d as u64).sum();
        total as f64 / self.depths.len() as f64
    }

    pub fn max_depth(&self) -> u32 {
        self.depths.values().copied().max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Asn, u32)> + '_ {
        self.depths.iter().map(|(&asn, &depth)| (asn, depth))
    }
}

impl fmt::Display for DistanceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (asn, depth) in &self.depths {
            write!(f, "{}@{}-", asn, depth)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_keeps_minimum() {
        let mut profile = DistanceProfile::from_link(1, 2);
        assert!(profile.extend(1, 3));
        assert!(profile.extend(3, 4));
        assert_eq!(profile.depth(4), Some(2));
        assert!(profile.extend(2, 4));
        assert_eq!(profile.depth(4), Some(1));
        assert!(!profile.extend(99, 5));
        assert_eq!(profile.max_depth(), 1);
    }

    #[test]
    fn test_combine_and_mean() {
        let mut a = DistanceProfile::from_origin(1);
        a.extend(1, 5);
        a.extend(5, 6);
        let mut b = DistanceProfile::from_origin(2);
        b.extend(2, 6);
        a.combine(&b);
        assert_eq!(a.depth(6), Some(1));
        assert_eq!(a.len(), 4);
        assert!((a.mean() - 0.5).abs() < 1e-9);
        assert_eq!(a.to_string(), "1@0-2@0-5@1-6@1-");
    }

    #[test]
    fn test_empty_profile() {
        let profile = DistanceProfile::default();
        assert_eq!(profile.mean(), 0.0);
        assert_eq!(profile.max_depth(), 0);
    }
}
