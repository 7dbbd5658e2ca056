//! Incremental repair of witness tables and bunches after a link failure.
//!
//! Only the region whose routing state depended on the removed link is
//! recomputed: records whose next-hop chain crossed the link are dropped,
//! then a Dijkstra restricted to that region and its still-valid boundary
//! rebuilds them.

use crate::audit::AuditLogger;
use crate::cluster::Bunches;
use crate::dijkstra::{run_dijkstra, within, DijkstraTable};
use crate::error::{OracleError, Result};
use crate::frontier::Frontier;
use crate::measure::DistanceProfile;
use crate::oracle::TZOracle;
use crate::topology::Asn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Result class of an edge deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepairStatus {
    /// Rejected before touching any state
    NotPerformed,
    /// Link removed, but some nodes lost every route to a top-level landmark
    Disconnected,
    /// Link removed and every table repaired
    Repaired,
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairStatus::NotPerformed => write!(f, "not-performed"),
            RepairStatus::Disconnected => write!(f, "disconnected"),
            RepairStatus::Repaired => write!(f, "repaired"),
        }
    }
}

/// What `remove_edge` did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub status: RepairStatus,
    /// Nodes whose witness or bunch state was recomputed or checked
    pub impacted_nodes: BTreeSet<Asn>,
    /// Touched nodes left without some top-level landmark
    pub disconnected_nodes: BTreeSet<Asn>,
    /// Depth of the invalidated nodes from the deleted link, on success
    pub distance_profile: Option<DistanceProfile>,
}

impl RepairOutcome {
    pub fn not_performed() -> Self {
        Self {
            status: RepairStatus::NotPerformed,
            impacted_nodes: BTreeSet::new(),
            disconnected_nodes: BTreeSet::new(),
            distance_profile: None,
        }
    }

    pub fn success(&self) -> bool {
        self.status == RepairStatus::Repaired
    }

    pub fn performed(&self) -> bool {
        self.status != RepairStatus::NotPerformed
    }
}

/// Removes from the bunch of `target` every entry for a landmark in
/// `unavailable` whose next hop is `next_hop`. Returns the removed landmarks.
pub fn purge_from_bunch(
    bunches: &mut Bunches,
    target: Asn,
    unavailable: &BTreeSet<Asn>,
    next_hop: Asn,
) -> BTreeSet<Asn> {
    let revoked: BTreeSet<Asn> = match bunches.bunch(target) {
        Some(bunch) => bunch
            .iter()
            .filter(|(landmark, record)| {
                record.next_hop == next_hop && unavailable.contains(landmark)
            })
            .map(|(&landmark, _)| landmark)
            .collect(),
        None => return BTreeSet::new(),
    };
    for &landmark in &revoked {
        bunches.remove(target, landmark);
    }
    revoked
}

impl TZOracle {
    /// Deletes the link `a`-`b` and patches witnesses and bunches.
    ///
    /// Unknown endpoints, missing links and endpoints of degree one are
    /// refused with `NotPerformed` and leave the oracle untouched. A split
    /// graph is reported as `Disconnected`; the topology change is kept.
    pub fn remove_edge(&mut self, a: Asn, b: Asn) -> Result<RepairOutcome> {
        if !self.is_preprocessed() {
            return Err(OracleError::NotPreprocessed);
        }

        let acceptable = self.topology.contains(a)
            && self.topology.contains(b)
            && self.topology.degree(a) > 1
            && self.topology.degree(b) > 1
            && self.topology.has_edge(a, b);
        if !acceptable {
            let outcome = RepairOutcome::not_performed();
            AuditLogger::log_edge_deletion(a, b, outcome.status, 0);
            return Ok(outcome);
        }

        if !self.topology.remove_link_pair(a, b)? {
            return Err(OracleError::invariant(format!(
                "link {}-{} vanished during deletion",
                a, b
            )));
        }

        let mut impacted = BTreeSet::new();
        let mut profile = DistanceProfile::from_link(a, b);

        for level in (0..self.hierarchy.k()).rev() {
            for (endpoint, broken) in [(a, b), (b, a)] {
                let (zone, measure) = self.fix_witness_by_round(endpoint, broken, level)?;
                impacted.extend(zone);
                profile.combine(&measure);
            }
            let (lower, upper) = self.witnesses.split_at_mut(level + 1);
            let overridden = lower[level].enforce_asterisk_rule(&upper[0]);
            tracing::debug!(level = level, overridden = overridden, "Witness level repaired");
        }

        for (endpoint, broken) in [(a, b), (b, a)] {
            let (touched, measure) = self.fix_bunches(endpoint, broken)?;
            impacted.extend(touched);
            profile.combine(&measure);
        }

        let expected = self.hierarchy.top_level_len();
        let disconnected: BTreeSet<Asn> = impacted
            .iter()
            .copied()
            .filter(|&asn| self.top_level_entries(asn) < expected)
            .collect();

        let outcome = if disconnected.is_empty() {
            RepairOutcome {
                status: RepairStatus::Repaired,
                impacted_nodes: impacted,
                disconnected_nodes: disconnected,
                distance_profile: Some(profile),
            }
        } else {
            AuditLogger::log_disconnection(a, b, disconnected.len());
            RepairOutcome {
                status: RepairStatus::Disconnected,
                impacted_nodes: impacted,
                disconnected_nodes: disconnected,
                distance_profile: None,
            }
        };

        AuditLogger::log_edge_deletion(a, b, outcome.status, outcome.impacted_nodes.len());
        Ok(outcome)
    }

    /// Repairs the level-`level` witnesses that reached their landmark
    /// through `endpoint -> broken`. Returns the recomputed region.
    pub(crate) fn fix_witness_by_round(
        &mut self,
        endpoint: Asn,
        broken: Asn,
        level: usize,
    ) -> Result<(BTreeSet<Asn>, DistanceProfile)> {
        let topology = &self.topology;
        let table = &mut self.witnesses[level];

        let through_broken = match table.get(endpoint) {
            Some(record) => record.next_hop == broken,
            None => false,
        };
        if !through_broken {
            return Ok(([endpoint].into_iter().collect(), DistanceProfile::from_origin(endpoint)));
        }

        // drop every record whose next-hop chain runs through the endpoint
        let mut zone: BTreeSet<Asn> = BTreeSet::new();
        let mut profile = DistanceProfile::from_origin(endpoint);
        table.remove(endpoint);
        zone.insert(endpoint);

        let mut added = vec![endpoint];
        while !added.is_empty() {
            let mut next = Vec::new();
            for &node in &added {
                for &neighbor in topology.neighbors(node) {
                    let points_back = table
                        .get(neighbor)
                        .map(|record| record.next_hop == node)
                        .unwrap_or(false);
                    if points_back {
                        table.remove(neighbor);
                        zone.insert(neighbor);
                        profile.extend(node, neighbor);
                        next.push(neighbor);
                    }
                }
            }
            added = next;
        }

        // reseed from valid neighbors of the invalidated zone
        let mut frontier = Frontier::new();
        let mut boundary = BTreeSet::new();
        for &node in &zone {
            for &neighbor in topology.neighbors(node) {
                if let Some(record) = table.get(neighbor) {
                    if record.is_reachable() && boundary.insert(neighbor) {
                        frontier.insert(*record)?;
                    }
                }
            }
        }

        let region: HashSet<Asn> = zone.iter().chain(boundary.iter()).copied().collect();
        run_dijkstra(topology, table.records_mut(), &mut frontier, within(&region))?;

        tracing::debug!(
            level = level,
            endpoint = endpoint,
            invalidated = zone.len(),
            boundary = boundary.len(),
            "Witness zone recomputed"
        );

        Ok((region.into_iter().collect(), profile))
    }

    /// Purges bunch entries that routed through `endpoint -> broken` and
    /// rebuilds the lost routes to top-level landmarks.
    pub(crate) fn fix_bunches(
        &mut self,
        endpoint: Asn,
        broken: Asn,
    ) -> Result<(BTreeSet<Asn>, DistanceProfile)> {
        let topology = &self.topology;
        let bunches = &mut self.bunches;
        let top: BTreeSet<Asn> = self.hierarchy.top_level().cloned().unwrap_or_default();

        let unavailable: BTreeSet<Asn> = match bunches.bunch(endpoint) {
            Some(bunch) => bunch
                .iter()
                .filter(|(_, record)| record.next_hop == broken)
                .map(|(&landmark, _)| landmark)
                .collect(),
            None => BTreeSet::new(),
        };

        let mut profile = DistanceProfile::from_origin(endpoint);
        let mut touched: BTreeSet<Asn> = BTreeSet::new();
        touched.insert(endpoint);

        if unavailable.is_empty() {
            return Ok((touched, profile));
        }

        let mut to_update: BTreeMap<Asn, BTreeSet<Asn>> = unavailable
            .intersection(&top)
            .map(|&landmark| (landmark, [endpoint].into_iter().collect()))
            .collect();

        purge_from_bunch(bunches, endpoint, &unavailable, broken);

        // purge recursively along the bunch next-hop trees
        let mut added: BTreeMap<Asn, BTreeSet<Asn>> = BTreeMap::new();
        added.insert(endpoint, unavailable);
        while !added.is_empty() {
            let mut next: BTreeMap<Asn, BTreeSet<Asn>> = BTreeMap::new();
            for (&node, deleted) in &added {
                for &neighbor in topology.neighbors(node) {
                    let revoked = purge_from_bunch(bunches, neighbor, deleted, node);
                    if revoked.is_empty() {
                        continue;
                    }
                    profile.extend(node, neighbor);
                    touched.insert(neighbor);
                    for landmark in revoked.iter() {
                        if let Some(zone) = to_update.get_mut(landmark) {
                            zone.insert(neighbor);
                        }
                    }
                    next.entry(neighbor).or_default().extend(revoked);
                }
            }
            added = next;
        }

        // rebuild routes to lost top-level landmarks from valid neighbors
        for (&landmark, zone) in &to_update {
            let mut table = DijkstraTable::new();
            let mut frontier = Frontier::new();
            for &node in zone {
                for &neighbor in topology.neighbors(node) {
                    if zone.contains(&neighbor) || table.contains_key(&neighbor) {
                        continue;
                    }
                    if let Some(record) = bunches.get(neighbor, landmark) {
                        table.insert(neighbor, *record);
                        frontier.insert(*record)?;
                    }
                }
            }

            let region: HashSet<Asn> = zone.iter().chain(table.keys()).copied().collect();
            run_dijkstra(topology, &mut table, &mut frontier, within(&region))?;

            tracing::debug!(
                landmark = landmark,
                purged = zone.len(),
                restored = table.len(),
                "Top-level bunch entries rebuilt"
            );

            for record in table.into_values() {
                bunches.insert(record);
            }
            touched.extend(region);
        }

        Ok((touched, profile))
    }
}
