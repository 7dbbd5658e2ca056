//! Thorup-Zwick approximate distance oracle over an AS topology.
//!
//! Preprocessing elects a landmark hierarchy, computes one witness table
//! per level and the bunch of every node. Queries walk witness and bunch
//! next hops to splice an approximate path; `remove_edge` (see
//! [`crate::repair`]) patches the tables in place after a link failure.

use crate::audit::{AuditLogger, AuditOutcome};
use crate::cluster::Bunches;
use crate::error::{OracleError, Result};
use crate::frontier::DistanceRecord;
use crate::landmarks::{LandmarkHierarchy, SelectionStrategy};
use crate::path::{splice, trace};
use crate::topology::{Asn, Route, Topology};
use crate::witness::WitnessTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Oracle construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TZConfig {
    /// Hierarchy depth
    pub k: usize,
    /// Seed of the landmark election RNG
    pub seed: u64,
}

impl Default for TZConfig {
    fn default() -> Self {
        Self { k: 3, seed: 42 }
    }
}

/// A broken invariant found by [`TZOracle::verify_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantReport {
    /// Levels are not nested, level 0 is not the node set, or level k is not empty
    Containment(String),
    /// A node has no witness record at a level
    MissingWitness { level: usize, asn: Asn },
    /// Tied distances with diverging parent or next hop
    Asterisk { level: usize, asn: Asn },
    /// A bunch lacks some top-level landmarks
    BunchCompleteness { asn: Asn, present: usize, expected: usize },
}

impl fmt::Display for InvariantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantReport::Containment(detail) => write!(f, "containment: {}", detail),
            InvariantReport::MissingWitness { level, asn } => {
                write!(f, "AS{} has no witness at level {}", asn, level)
            }
            InvariantReport::Asterisk { level, asn } => {
                write!(f, "AS{} breaks the asterisk rule at level {}", asn, level)
            }
            InvariantReport::BunchCompleteness {
                asn,
                present,
                expected,
            } => write!(
                f,
                "AS{} knows {} of {} top-level landmarks",
                asn, present, expected
            ),
        }
    }
}

/// Pivot found by the query loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pivot {
    pub level: usize,
    /// Node walking to the pivot through witness next hops
    pub near: Asn,
    /// Node walking to the pivot through bunch next hops
    pub far: Asn,
    pub landmark: Asn,
}

/// The oracle: topology, landmark hierarchy, witness tables and bunches.
///
/// Cloning deep-copies every table, which is how snapshots are taken.
#[derive(Debug, Clone)]
pub struct TZOracle {
    pub(crate) config: TZConfig,
    pub(crate) topology: Topology,
    pub(crate) hierarchy: LandmarkHierarchy,
    /// `k + 1` tables once preprocessed, empty before
    pub(crate) witnesses: Vec<WitnessTable>,
    pub(crate) bunches: Bunches,
}

impl TZOracle {
    pub fn new(topology: Topology, config: TZConfig) -> Self {
        Self {
            config,
            topology,
            hierarchy: LandmarkHierarchy::default(),
            witnesses: Vec::new(),
            bunches: Bunches::new(),
        }
    }

    /// Rebuilds an oracle from persisted tables, validating bunch cardinality.
    pub fn restore(
        topology: Topology,
        config: TZConfig,
        hierarchy: LandmarkHierarchy,
        witnesses: Vec<WitnessTable>,
        bunches: Bunches,
    ) -> Result<Self> {
        let oracle = Self {
            config: TZConfig {
                k: hierarchy.k(),
                ..config
            },
            topology,
            hierarchy,
            witnesses,
            bunches,
        };

        let result = oracle.validate_restored();
        match &result {
            Ok(()) => AuditLogger::log_state_restore(oracle.topology.len(), AuditOutcome::Success, None),
            Err(e) => AuditLogger::log_state_restore(
                oracle.topology.len(),
                AuditOutcome::Failure,
                Some(&e.to_string()),
            ),
        }
        result.map(|_| oracle)
    }

    fn validate_restored(&self) -> Result<()> {
        let k = self.hierarchy.k();
        if k < 1 {
            return Err(OracleError::InvalidState("no landmark levels".to_string()));
        }
        self.hierarchy
            .validate(&self.topology)
            .map_err(OracleError::InvalidState)?;
        if self.witnesses.len() != k + 1 {
            return Err(OracleError::InvalidState(format!(
                "expected {} witness levels, found {}",
                k + 1,
                self.witnesses.len()
            )));
        }
        for (level, table) in self.witnesses.iter().enumerate() {
            if let Some(asn) = self.topology.asns().find(|&asn| !table.contains(asn)) {
                return Err(OracleError::InvalidState(format!(
                    "AS{} has no witness at level {}",
                    asn, level
                )));
            }
        }
        let expected = self.hierarchy.top_level_len();
        for asn in self.topology.asns() {
            let present = self.top_level_entries(asn);
            if present < expected {
                return Err(OracleError::InvalidState(format!(
                    "bunch of AS{} holds {} of {} top-level landmarks",
                    asn, present, expected
                )));
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &TZConfig {
        &self.config
    }

    pub fn k(&self) -> usize {
        self.config.k
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn hierarchy(&self) -> &LandmarkHierarchy {
        &self.hierarchy
    }

    pub fn witnesses(&self) -> &[WitnessTable] {
        &self.witnesses
    }

    pub fn bunches(&self) -> &Bunches {
        &self.bunches
    }

    pub fn is_preprocessed(&self) -> bool {
        !self.witnesses.is_empty()
    }

    pub fn count_links(&self) -> usize {
        self.topology.count_links()
    }

    /// Elects landmarks with an RNG seeded from the configuration.
    pub fn elect_landmarks(&mut self, strategy: &SelectionStrategy) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.elect_landmarks_with(strategy, &mut rng)
    }

    /// Elects landmarks with a caller-supplied randomness source. Drops any
    /// preprocessed tables.
    pub fn elect_landmarks_with<R: Rng + ?Sized>(
        &mut self,
        strategy: &SelectionStrategy,
        rng: &mut R,
    ) -> Result<()> {
        let hierarchy = LandmarkHierarchy::elect(&self.topology, self.config.k, strategy, rng)?;
        AuditLogger::log_landmark_election(
            strategy.kind(),
            hierarchy.k(),
            hierarchy.top_level_len(),
            AuditOutcome::Success,
        );
        self.install_hierarchy(hierarchy);
        Ok(())
    }

    /// Uses an explicit hierarchy. Drops any preprocessed tables.
    pub fn set_hierarchy(&mut self, hierarchy: LandmarkHierarchy) -> Result<()> {
        hierarchy
            .validate(&self.topology)
            .map_err(OracleError::InvalidState)?;
        self.install_hierarchy(hierarchy);
        Ok(())
    }

    fn install_hierarchy(&mut self, hierarchy: LandmarkHierarchy) {
        self.config.k = hierarchy.k();
        self.hierarchy = hierarchy;
        self.witnesses.clear();
        self.bunches = Bunches::new();
    }

    /// Computes witness tables top-down, then clusters and bunches.
    pub fn preprocess(&mut self) -> Result<()> {
        let k = self.hierarchy.k();
        if k < 1 {
            return Err(OracleError::InvalidDepth(k));
        }
        if self.hierarchy.top_level_len() == 0 {
            AuditLogger::log_preprocess(k, 0, AuditOutcome::Failure);
            return Err(OracleError::EmptyTopLevel);
        }

        let mut witnesses = vec![WitnessTable::new(0); k + 1];
        witnesses[k] = WitnessTable::infinity_level(&self.topology, k);

        for level in (0..k).rev() {
            tracing::info!(level = level, "Starting witness round");
            let landmarks = self
                .hierarchy
                .level(level)
                .ok_or_else(|| OracleError::invariant(format!("missing landmark level {}", level)))?;
            let mut table = WitnessTable::compute_level(&self.topology, level, landmarks)?;
            let overridden = table.enforce_asterisk_rule(&witnesses[level + 1]);
            tracing::debug!(level = level, overridden = overridden, "Asterisk rule applied");
            witnesses[level] = table;
        }

        self.bunches = Bunches::build(&self.topology, &self.hierarchy, &witnesses)?;
        self.witnesses = witnesses;

        AuditLogger::log_preprocess(k, self.bunches.total_entries(), AuditOutcome::Success);
        Ok(())
    }

    fn ensure_ready(&self, a: Asn, b: Asn) -> Result<()> {
        if !self.is_preprocessed() {
            return Err(OracleError::NotPreprocessed);
        }
        for asn in [a, b] {
            if !self.topology.contains(asn) {
                return Err(OracleError::UnknownNode(asn));
            }
        }
        Ok(())
    }

    /// Query loop: alternate endpoints climbing the hierarchy until the far
    /// endpoint's bunch holds the near endpoint's witness.
    pub(crate) fn find_pivot(&self, origin: Asn, destination: Asn) -> Result<Pivot> {
        let k = self.hierarchy.k();
        let mut near = origin;
        let mut far = destination;
        let mut landmark = origin;
        let mut level = 0;

        loop {
            if self.bunches.contains(far, landmark) {
                return Ok(Pivot {
                    level,
                    near,
                    far,
                    landmark,
                });
            }
            level += 1;
            if level >= k {
                return Err(OracleError::invariant(format!(
                    "no pivot between AS{} and AS{} within {} rounds",
                    origin, destination, k
                )));
            }
            std::mem::swap(&mut near, &mut far);
            landmark = self.witnesses[level].require(near)?.parent;
        }
    }

    /// Approximate path from `origin` to `destination` and the round it was
    /// resolved at.
    pub fn approximate_path(&self, origin: Asn, destination: Asn) -> Result<(usize, Vec<Asn>)> {
        self.ensure_ready(origin, destination)?;
        let pivot = self.find_pivot(origin, destination)?;
        let max_steps = self.topology.len();

        let witness = &self.witnesses[pivot.level];
        let near_walk = trace(pivot.near, pivot.landmark, max_steps, |asn| {
            witness.get(asn).map(|r| r.next_hop)
        })?;
        let far_walk = trace(pivot.far, pivot.landmark, max_steps, |asn| {
            self.bunches.get(asn, pivot.landmark).map(|r| r.next_hop)
        })?;

        let mut path = splice(&near_walk, &far_walk);
        if pivot.level % 2 == 1 {
            path.reverse();
        }
        Ok((pivot.level, path))
    }

    /// Approximate path together with the relationship of every hop.
    pub fn get_route(&self, origin: Asn, destination: Asn) -> Result<Route> {
        let (_, nodes) = self.approximate_path(origin, destination)?;
        let links = self.topology.link_types(&nodes).ok_or_else(|| {
            OracleError::invariant(format!(
                "route {} -> {} crosses a missing link",
                origin, destination
            ))
        })?;
        Ok(Route { nodes, links })
    }

    /// Distance estimate d(near, w) + d(w, far) of the pivot.
    pub fn estimate_distance(&self, origin: Asn, destination: Asn) -> Result<u32> {
        self.ensure_ready(origin, destination)?;
        let pivot = self.find_pivot(origin, destination)?;
        let near = self.witnesses[pivot.level].require(pivot.near)?;
        let far = self
            .bunches
            .get(pivot.far, pivot.landmark)
            .ok_or_else(|| OracleError::invariant("pivot vanished from bunch"))?;
        Ok(near.distance + far.distance)
    }

    pub fn witness(&self, level: usize, asn: Asn) -> Option<&DistanceRecord> {
        self.witnesses.get(level)?.get(asn)
    }

    pub fn bunch(&self, asn: Asn) -> Option<&HashMap<Asn, DistanceRecord>> {
        self.bunches.bunch(asn)
    }

    pub fn total_bunch_entries(&self) -> usize {
        self.bunches.total_entries()
    }

    /// Number of top-level landmarks held in the bunch of `asn`.
    pub fn top_level_entries(&self, asn: Asn) -> usize {
        match (self.hierarchy.top_level(), self.bunches.bunch(asn)) {
            (Some(top), Some(bunch)) => top.iter().filter(|l| bunch.contains_key(l)).count(),
            _ => 0,
        }
    }

    /// Checks hierarchy containment, witness coverage, asterisk consistency
    /// and bunch completeness over every node.
    pub fn verify_invariants(&self) -> Vec<InvariantReport> {
        let mut reports = Vec::new();

        if let Err(detail) = self.hierarchy.validate(&self.topology) {
            reports.push(InvariantReport::Containment(detail));
        }

        let k = self.hierarchy.k();
        if self.witnesses.len() == k + 1 {
            for level in 0..k {
                let (lower, upper) = (&self.witnesses[level], &self.witnesses[level + 1]);
                for asn in self.topology.asns() {
                    let (Some(here), Some(above)) = (lower.get(asn), upper.get(asn)) else {
                        reports.push(InvariantReport::MissingWitness { level, asn });
                        continue;
                    };
                    if here.distance == above.distance
                        && (here.parent != above.parent || here.next_hop != above.next_hop)
                    {
                        reports.push(InvariantReport::Asterisk { level, asn });
                    }
                }
            }
        }

        let expected = self.hierarchy.top_level_len();
        for asn in self.topology.asns() {
            let present = self.top_level_entries(asn);
            if present < expected {
                reports.push(InvariantReport::BunchCompleteness {
                    asn,
                    present,
                    expected,
                });
            }
        }

        reports
    }
}
