//! Per-level witness tables: nearest landmark of each node at each level.

use crate::dijkstra::{run_dijkstra, DijkstraTable};
use crate::error::{OracleError, Result};
use crate::frontier::{DistanceRecord, Frontier};
use crate::topology::{Asn, Topology};
use std::collections::{BTreeSet, HashMap};

/// Nearest level-`i` landmark for every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessTable {
    level: usize,
    records: HashMap<Asn, DistanceRecord>,
}

impl WitnessTable {
    pub fn new(level: usize) -> Self {
        Self {
            level,
            records: HashMap::new(),
        }
    }

    pub(crate) fn from_records(level: usize, records: HashMap<Asn, DistanceRecord>) -> Self {
        Self { level, records }
    }

    /// Table of the (empty) top level: every node unreachable.
    pub fn infinity_level(topology: &Topology, level: usize) -> Self {
        let records = topology
            .asns()
            .map(|asn| (asn, DistanceRecord::unreachable(asn)))
            .collect();
        Self { level, records }
    }

    /// Multi-source Dijkstra seeded with every landmark of `landmarks`.
    pub fn compute_level(
        topology: &Topology,
        level: usize,
        landmarks: &BTreeSet<Asn>,
    ) -> Result<Self> {
        let mut table: DijkstraTable = landmarks
            .iter()
            .map(|&asn| (asn, DistanceRecord::root(asn)))
            .collect();
        let mut frontier = Frontier::with_roots(landmarks.iter().copied());
        run_dijkstra(topology, &mut table, &mut frontier, |_, _| true)?;

        // nodes in other components keep an unreachable record
        for asn in topology.asns() {
            table.entry(asn).or_insert_with(|| DistanceRecord::unreachable(asn));
        }

        Ok(Self {
            level,
            records: table,
        })
    }

    /// Copies parent and next hop from `upper` wherever the distance ties.
    /// Returns how many records were overridden.
    pub fn enforce_asterisk_rule(&mut self, upper: &WitnessTable) -> usize {
        let mut overridden = 0;
        for (asn, record) in self.records.iter_mut() {
            if let Some(above) = upper.records.get(asn) {
                if above.distance == record.distance
                    && (above.parent != record.parent || above.next_hop != record.next_hop)
                {
                    record.parent = above.parent;
                    record.next_hop = above.next_hop;
                    overridden += 1;
                }
            }
        }
        overridden
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn get(&self, asn: Asn) -> Option<&DistanceRecord> {
        self.records.get(&asn)
    }

    /// Record of `asn`, or an invariant violation if the table has none.
    pub fn require(&self, asn: Asn) -> Result<&DistanceRecord> {
        self.records.get(&asn).ok_or_else(|| {
            OracleError::invariant(format!(
                "AS{} has no witness at level {}",
                asn, self.level
            ))
        })
    }

    /// Raw records, for searches that patch the table in place.
    pub(crate) fn records_mut(&mut self) -> &mut DijkstraTable {
        &mut self.records
    }

    pub fn insert(&mut self, record: DistanceRecord) -> Option<DistanceRecord> {
        self.records.insert(record.reference, record)
    }

    pub fn remove(&mut self, asn: Asn) -> Option<DistanceRecord> {
        self.records.remove(&asn)
    }

    pub fn contains(&self, asn: Asn) -> bool {
        self.records.contains_key(&asn)
    }

    pub fn records(&self) -> impl Iterator<Item = &DistanceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
