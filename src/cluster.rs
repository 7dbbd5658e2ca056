//! Clusters of retiring landmarks and their inversion into bunches.
//!
//! The cluster of a landmark `w` retiring at level `i` (in `A_i` but not in
//! `A_{i+1}`) holds every node strictly closer to `w` than to its nearest
//! level-`i+1` landmark. The search is cut at that bound, which yields the
//! same membership as a full search because clusters are closed under
//! shortest-path prefixes.

use crate::dijkstra::{run_dijkstra, DijkstraTable};
use crate::error::Result;
use crate::frontier::{DistanceRecord, Frontier, INFINITY};
use crate::landmarks::LandmarkHierarchy;
use crate::topology::{Asn, Topology};
use crate::witness::WitnessTable;
use rayon::prelude::*;
use std::collections::HashMap;

/// Shortest-path tree of one retiring landmark.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub landmark: Asn,
    pub level: usize,
    pub members: DijkstraTable,
}

impl Cluster {
    /// Bounded single-source search from `landmark`, admitting a node only
    /// while it is strictly closer than its witness in `upper`.
    pub fn grow(
        topology: &Topology,
        landmark: Asn,
        level: usize,
        upper: &WitnessTable,
    ) -> Result<Self> {
        let mut members = DijkstraTable::new();
        members.insert(landmark, DistanceRecord::root(landmark));
        let mut frontier = Frontier::with_roots([landmark]);

        run_dijkstra(topology, &mut members, &mut frontier, |asn, distance| {
            let bound = upper.get(asn).map(|r| r.distance).unwrap_or(INFINITY);
            distance < bound
        })?;

        Ok(Self {
            landmark,
            level,
            members,
        })
    }
}

/// Every cluster of the landmarks retiring at `level`, grown in parallel.
pub fn clusters_for_level(
    topology: &Topology,
    hierarchy: &LandmarkHierarchy,
    level: usize,
    upper: &WitnessTable,
) -> Result<Vec<Cluster>> {
    hierarchy
        .retiring(level)
        .into_par_iter()
        .map(|landmark| Cluster::grow(topology, landmark, level, upper))
        .collect()
}

/// Bunch of every node: landmark id → record pointing toward that landmark.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bunches {
    entries: HashMap<Asn, HashMap<Asn, DistanceRecord>>,
}

impl Bunches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes clusters for every level and inverts them.
    ///
    /// `witnesses` must hold the `k + 1` tables of `hierarchy`.
    pub fn build(
        topology: &Topology,
        hierarchy: &LandmarkHierarchy,
        witnesses: &[WitnessTable],
    ) -> Result<Self> {
        let mut bunches = Bunches::new();
        for asn in topology.asns() {
            bunches.entries.entry(asn).or_default();
        }

        for level in (0..hierarchy.k()).rev() {
            let upper = &witnesses[level + 1];
            let clusters = clusters_for_level(topology, hierarchy, level, upper)?;
            tracing::debug!(level = level, clusters = clusters.len(), "Clusters grown");
            for cluster in clusters {
                bunches.absorb(cluster);
            }
        }

        Ok(bunches)
    }

    fn absorb(&mut self, cluster: Cluster) {
        for (member, record) in cluster.members {
            self.entries
                .entry(member)
                .or_default()
                .insert(cluster.landmark, record);
        }
    }

    /// Entry of `owner` for `landmark`.
    pub fn get(&self, owner: Asn, landmark: Asn) -> Option<&DistanceRecord> {
        self.entries.get(&owner)?.get(&landmark)
    }

    pub fn contains(&self, owner: Asn, landmark: Asn) -> bool {
        self.get(owner, landmark).is_some()
    }

    /// The whole bunch of `owner`.
    pub fn bunch(&self, owner: Asn) -> Option<&HashMap<Asn, DistanceRecord>> {
        self.entries.get(&owner)
    }

    /// Stores `record` as the entry of `record.reference` for `record.parent`.
    pub fn insert(&mut self, record: DistanceRecord) -> Option<DistanceRecord> {
        self.entries
            .entry(record.reference)
            .or_default()
            .insert(record.parent, record)
    }

    pub fn remove(&mut self, owner: Asn, landmark: Asn) -> Option<DistanceRecord> {
        self.entries.get_mut(&owner)?.remove(&landmark)
    }

    pub fn bunch_len(&self, owner: Asn) -> usize {
        self.entries.get(&owner).map(|b| b.len()).unwrap_or(0)
    }

    pub fn owners(&self) -> impl Iterator<Item = Asn> + '_ {
        self.entries.keys().copied()
    }

    /// Every stored entry, across all owners.
    pub fn records(&self) -> impl Iterator<Item = &DistanceRecord> {
        self.entries.values().flat_map(|bunch| bunch.values())
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Relationship;
    use std::collections::BTreeSet;

    fn path_graph(n: Asn) -> Topology {
        let mut t = Topology::new();
        for i in 1..n {
            t.add_edge(i, i + 1, Relationship::Peer);
        }
        t
    }

    fn build(t: &Topology, levels: Vec<BTreeSet<Asn>>) -> (LandmarkHierarchy, Bunches) {
        let h = LandmarkHierarchy::from_levels(t, levels).unwrap();
        let k = h.k();
        let mut witnesses = vec![WitnessTable::infinity_level(t, k)];
        for level in (0..k).rev() {
            let mut table =
                WitnessTable::compute_level(t, level, h.level(level).unwrap()).unwrap();
            table.enforce_asterisk_rule(&witnesses[0]);
            witnesses.insert(0, table);
        }
        let bunches = Bunches::build(t, &h, &witnesses).unwrap();
        (h, bunches)
    }

    #[test]
    fn test_top_level_landmark_in_every_bunch() {
        let t = path_graph(6);
        let levels = vec![(1..=6).collect(), [3].into_iter().collect()];
        let (_, bunches) = build(&t, levels);
        for asn in 1..=6 {
            let entry = bunches.get(asn, 3).unwrap();
            assert_eq!(entry.reference, asn);
            assert_eq!(entry.parent, 3);
            assert_eq!(entry.distance, (asn as i64 - 3).unsigned_abs() as u32);
        }
    }

    #[test]
    fn test_level_zero_clusters_are_bounded() {
        // A1 = {1}: node 4's cluster holds nodes strictly closer to 4 than to 1
        let t = path_graph(5);
        let levels = vec![(1..=5).collect(), [1].into_iter().collect()];
        let (_, bunches) = build(&t, levels);
        // d(4,3)=1 < d(3,1)=2, d(4,2)=2 !< d(2,1)=1
        assert!(bunches.contains(3, 4));
        assert!(!bunches.contains(2, 4));
        assert!(bunches.contains(5, 4));
        // every node holds itself
        for asn in 2..=5 {
            assert_eq!(bunches.get(asn, asn).unwrap().distance, 0);
        }
    }

    #[test]
    fn test_insert_and_remove_entries() {
        let mut bunches = Bunches::new();
        let record = DistanceRecord {
            reference: 2,
            distance: 1,
            parent: 9,
            next_hop: 9,
        };
        assert!(bunches.insert(record).is_none());
        assert_eq!(bunches.total_entries(), 1);
        assert_eq!(bunches.remove(2, 9), Some(record));
        assert!(bunches.is_empty());
    }
}
