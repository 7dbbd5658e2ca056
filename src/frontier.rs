//! Distance records and the bucketed Dijkstra frontier.
//!
//! Edge weights are small integers, so the frontier keeps one bucket
//! ("zone") per distance value plus the current minimum instead of a heap.

use crate::error::{OracleError, Result};
use crate::topology::Asn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Distance standing for "unreachable". Frontiers never hold it.
pub const INFINITY: u32 = 1_000_000;

/// Weight of every link.
pub const EDGE_WEIGHT: u32 = 1;

/// What a node knows about one landmark: how far it is and which neighbor
/// leads there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistanceRecord {
    /// Node this record belongs to
    pub reference: Asn,
    /// Hop distance to `parent`
    pub distance: u32,
    /// Landmark the record is anchored to
    pub parent: Asn,
    /// Neighbor one step closer to `parent`
    pub next_hop: Asn,
}

impl DistanceRecord {
    /// Record of a landmark for itself.
    pub fn root(asn: Asn) -> Self {
        Self {
            reference: asn,
            distance: 0,
            parent: asn,
            next_hop: asn,
        }
    }

    /// Self-referential record at `INFINITY` (top of the hierarchy).
    pub fn unreachable(asn: Asn) -> Self {
        Self {
            reference: asn,
            distance: INFINITY,
            parent: asn,
            next_hop: asn,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.distance < INFINITY
    }

    /// Record for `neighbor` reached through `self`.
    pub fn extended_to(&self, neighbor: Asn) -> Self {
        Self {
            reference: neighbor,
            distance: self.distance + EDGE_WEIGHT,
            parent: self.parent,
            next_hop: self.reference,
        }
    }
}

impl fmt::Display for DistanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}= {}...{}->({})>",
            self.reference, self.parent, self.next_hop, self.distance
        )
    }
}

/// Multi-source Dijkstra frontier keyed by integer distance.
#[derive(Debug, Clone)]
pub struct Frontier {
    zones: HashMap<u32, HashMap<Asn, DistanceRecord>>,
    min_distance: u32,
    population: usize,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            zones: HashMap::new(),
            min_distance: INFINITY,
            population: 0,
        }
    }

    /// Frontier seeded with zero-distance roots.
    pub fn with_roots(roots: impl IntoIterator<Item = Asn>) -> Self {
        let mut frontier = Self::new();
        let zone = frontier.zones.entry(0).or_default();
        for asn in roots {
            if zone.insert(asn, DistanceRecord::root(asn)).is_none() {
                frontier.population += 1;
            }
        }
        if frontier.population > 0 {
            frontier.min_distance = 0;
        } else {
            frontier.zones.clear();
        }
        frontier
    }

    /// Places `record` in the zone of its distance.
    ///
    /// Returns false if the node is already tracked at that distance. An
    /// unreachable record is an invariant violation.
    pub fn insert(&mut self, record: DistanceRecord) -> Result<bool> {
        if record.distance >= INFINITY {
            return Err(OracleError::invariant(format!(
                "frontier cannot hold infinite distance record {}",
                record
            )));
        }

        let zone = self.zones.entry(record.distance).or_default();
        if zone.contains_key(&record.reference) {
            return Ok(false);
        }
        zone.insert(record.reference, record);
        self.population += 1;

        if record.distance < self.min_distance {
            self.min_distance = record.distance;
        }

        Ok(true)
    }

    /// Removes `record` from the zone of its distance. Returns false if it
    /// was not there.
    pub fn remove(&mut self, record: &DistanceRecord) -> bool {
        let existed = match self.zones.get_mut(&record.distance) {
            Some(zone) => zone.remove(&record.reference).is_some(),
            None => false,
        };

        if existed {
            self.population -= 1;
            let emptied = self
                .zones
                .get(&record.distance)
                .map(|zone| zone.is_empty())
                .unwrap_or(false);
            if emptied {
                self.zones.remove(&record.distance);
                if record.distance == self.min_distance {
                    self.rescan_min();
                }
            }
        }

        existed
    }

    /// Takes an arbitrary record out of the closest zone.
    pub fn extract_min(&mut self) -> Option<DistanceRecord> {
        if self.population == 0 {
            return None;
        }
        let record = self
            .zones
            .get(&self.min_distance)
            .and_then(|zone| zone.values().next().copied())?;
        self.remove(&record);
        Some(record)
    }

    fn rescan_min(&mut self) {
        self.min_distance = self.zones.keys().copied().min().unwrap_or(INFINITY);
    }

    pub fn len(&self) -> usize {
        self.population
    }

    pub fn is_empty(&self) -> bool {
        self.population == 0
    }

    /// Smallest tracked distance, `INFINITY` when empty.
    pub fn min_distance(&self) -> u32 {
        self.min_distance
    }
}

impl fmt::Display for Frontier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frontier (distance {}):", self.min_distance)?;
        if let Some(zone) = self.zones.get(&self.min_distance) {
            for asn in zone.keys() {
                writeln!(f, "\t{}", asn)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(asn: Asn, distance: u32) -> DistanceRecord {
        DistanceRecord {
            reference: asn,
            distance,
            parent: 0,
            next_hop: 0,
        }
    }

    #[test]
    fn test_extract_in_distance_order() {
        let mut f = Frontier::new();
        assert!(f.insert(rec(1, 5)).unwrap());
        assert!(f.insert(rec(2, 2)).unwrap());
        assert!(f.insert(rec(3, 9)).unwrap());
        assert!(f.insert(rec(4, 2)).unwrap());
        assert_eq!(f.min_distance(), 2);

        let mut order = Vec::new();
        while let Some(r) = f.extract_min() {
            order.push(r.distance);
        }
        assert_eq!(order, vec![2, 2, 5, 9]);
        assert!(f.is_empty());
        assert_eq!(f.min_distance(), INFINITY);
    }

    #[test]
    fn test_duplicate_insert_is_refused() {
        let mut f = Frontier::new();
        assert!(f.insert(rec(1, 3)).unwrap());
        assert!(!f.insert(rec(1, 3)).unwrap());
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_infinite_insert_fails() {
        let mut f = Frontier::new();
        assert!(f.insert(rec(1, INFINITY)).is_err());
    }

    #[test]
    fn test_remove_then_reinsert_relaxes() {
        let mut f = Frontier::new();
        f.insert(rec(1, 1)).unwrap();
        f.insert(rec(2, 7)).unwrap();
        // relax node 2 from 7 down to 3, removing from a non-minimum zone
        assert!(f.remove(&rec(2, 7)));
        f.insert(rec(2, 3)).unwrap();
        assert_eq!(f.len(), 2);
        assert_eq!(f.extract_min().unwrap().reference, 1);
        let second = f.extract_min().unwrap();
        assert_eq!((second.reference, second.distance), (2, 3));
        assert!(!f.remove(&rec(2, 3)));
    }

    #[test]
    fn test_with_roots() {
        let mut f = Frontier::with_roots([4, 8]);
        assert_eq!(f.len(), 2);
        let r = f.extract_min().unwrap();
        assert_eq!(r.distance, 0);
        assert_eq!(r.parent, r.reference);
        assert!(Frontier::with_roots(std::iter::empty()).is_empty());
    }
}
