//! Landmark hierarchy A_0 ⊇ A_1 ⊇ … ⊇ A_k = ∅ and its election strategies.

use crate::error::{OracleError, Result};
use crate::topology::{Asn, Topology};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Externally supplied ordering of nodes by topological rank (best first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRanking {
    order: Vec<Asn>,
}

impl NodeRanking {
    pub fn new(order: Vec<Asn>) -> Self {
        Self { order }
    }

    /// Rank index of every listed node; the first occurrence wins.
    pub fn positions(&self) -> HashMap<Asn, usize> {
        let mut positions = HashMap::with_capacity(self.order.len());
        for (idx, &asn) in self.order.iter().enumerate() {
            positions.entry(asn).or_insert(idx);
        }
        positions
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Numeric strategy codes, used in persisted file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Random,
    Spline,
    Harmonic,
    Immunity,
}

impl StrategyKind {
    pub fn code(self) -> u8 {
        match self {
            StrategyKind::Random => 0,
            StrategyKind::Spline => 1,
            StrategyKind::Harmonic => 2,
            StrategyKind::Immunity => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(StrategyKind::Random),
            1 => Some(StrategyKind::Spline),
            2 => Some(StrategyKind::Harmonic),
            3 => Some(StrategyKind::Immunity),
            _ => None,
        }
    }

    pub fn needs_ranking(self) -> bool {
        self != StrategyKind::Random
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Random => write!(f, "random"),
            StrategyKind::Spline => write!(f, "spline"),
            StrategyKind::Harmonic => write!(f, "harmonic"),
            StrategyKind::Immunity => write!(f, "immunity"),
        }
    }
}

/// How members of A_{i-1} are sampled into A_i.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionStrategy {
    /// Every node kept with probability |V|^(-1/k)
    Random,
    /// Piecewise-linear boost for highly ranked nodes
    Spline(NodeRanking),
    /// Boost decaying harmonically with rank, flattened at higher levels
    Harmonic(NodeRanking),
    /// Harmonic-like boost; picking a node zeroes its neighbors' weights
    Immunity(NodeRanking),
}

impl SelectionStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            SelectionStrategy::Random => StrategyKind::Random,
            SelectionStrategy::Spline(_) => StrategyKind::Spline,
            SelectionStrategy::Harmonic(_) => StrategyKind::Harmonic,
            SelectionStrategy::Immunity(_) => StrategyKind::Immunity,
        }
    }

    /// Builds the strategy of `kind`, with `ranking` for the ranked ones.
    pub fn from_kind(kind: StrategyKind, ranking: Option<NodeRanking>) -> Result<Self> {
        let ranked = |ranking: Option<NodeRanking>| {
            ranking.ok_or_else(|| {
                OracleError::InvalidState(format!("strategy {} requires a node ranking", kind))
            })
        };
        Ok(match kind {
            StrategyKind::Random => SelectionStrategy::Random,
            StrategyKind::Spline => SelectionStrategy::Spline(ranked(ranking)?),
            StrategyKind::Harmonic => SelectionStrategy::Harmonic(ranked(ranking)?),
            StrategyKind::Immunity => SelectionStrategy::Immunity(ranked(ranking)?),
        })
    }
}

fn spline_weight(rank: usize) -> f64 {
    let i = rank as f64;
    if rank < 1000 {
        (-0.02 * i + 30.0) / 4.0
    } else if rank < 20000 {
        (0.0005105 * i + 9.49) / 4.0
    } else {
        0.05
    }
}

fn harmonic_weight(rank: usize) -> f64 {
    let i = rank as f64;
    if rank < 216 {
        36.0 - 0.0000001 * i * i - 0.000001 * i * i * i
    } else {
        5600.0 / i
    }
}

fn immunity_weight(rank: usize) -> f64 {
    10000.0 / (rank as f64 + 100.0)
}

/// Nested landmark levels; `levels[0]` holds every node, `levels[k]` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandmarkHierarchy {
    levels: Vec<BTreeSet<Asn>>,
}

impl LandmarkHierarchy {
    /// Samples a hierarchy of depth `k` over `topology`.
    pub fn elect<R: Rng + ?Sized>(
        topology: &Topology,
        k: usize,
        strategy: &SelectionStrategy,
        rng: &mut R,
    ) -> Result<Self> {
        if k < 1 {
            return Err(OracleError::InvalidDepth(k));
        }

        let base = (topology.len().max(1) as f64).powf(-1.0 / k as f64);
        let mut levels: Vec<BTreeSet<Asn>> = Vec::with_capacity(k + 1);
        levels.push(topology.asns().collect());

        let mut weights: HashMap<Asn, f64> = match strategy {
            SelectionStrategy::Random => HashMap::new(),
            SelectionStrategy::Spline(ranking) => ranking
                .positions()
                .into_iter()
                .map(|(asn, rank)| (asn, spline_weight(rank)))
                .collect(),
            SelectionStrategy::Harmonic(ranking) => ranking
                .positions()
                .into_iter()
                .map(|(asn, rank)| (asn, harmonic_weight(rank)))
                .collect(),
            SelectionStrategy::Immunity(ranking) => ranking
                .positions()
                .into_iter()
                .map(|(asn, rank)| (asn, immunity_weight(rank)))
                .collect(),
        };

        for level in 1..k {
            let mut selected = BTreeSet::new();
            for &asn in &levels[level - 1] {
                let extraction: f64 = rng.gen();
                let weight = weights.get(&asn).copied().unwrap_or(0.0);
                let picked = match strategy {
                    SelectionStrategy::Random => extraction <= base,
                    SelectionStrategy::Spline(_) => extraction < weight * base,
                    SelectionStrategy::Harmonic(_) | SelectionStrategy::Immunity(_) => {
                        extraction < weight.powf(1.0 / level as f64) * base
                    }
                };
                if picked {
                    selected.insert(asn);
                    if let SelectionStrategy::Immunity(_) = strategy {
                        for &neighbor in topology.neighbors(asn) {
                            weights.insert(neighbor, 0.0);
                        }
                    }
                }
            }
            levels.push(selected);
        }

        levels.push(BTreeSet::new());

        tracing::debug!(
            strategy = %strategy.kind(),
            k = k,
            sizes = ?levels.iter().map(|l| l.len()).collect::<Vec<_>>(),
            "Landmarks elected"
        );

        Ok(Self { levels })
    }

    /// Hierarchy from explicit levels `A_0..A_{k-1}`; `A_k = ∅` is appended.
    ///
    /// Level 0 must equal the node set and each level must contain the next.
    pub fn from_levels(topology: &Topology, levels: Vec<BTreeSet<Asn>>) -> Result<Self> {
        if levels.is_empty() {
            return Err(OracleError::InvalidDepth(0));
        }
        let all: BTreeSet<Asn> = topology.asns().collect();
        if levels[0] != all {
            return Err(OracleError::InvalidState(
                "level 0 must contain exactly every node".to_string(),
            ));
        }
        for (i, pair) in levels.windows(2).enumerate() {
            if !pair[1].is_subset(&pair[0]) {
                return Err(OracleError::InvalidState(format!(
                    "level {} is not contained in level {}",
                    i + 1,
                    i
                )));
            }
        }
        let mut levels = levels;
        levels.push(BTreeSet::new());
        Ok(Self { levels })
    }

    /// Hierarchy made of already-complete levels `A_0..A_k` (as loaded from disk).
    pub(crate) fn from_raw(levels: Vec<BTreeSet<Asn>>) -> Self {
        Self { levels }
    }

    /// Hierarchy depth k; 0 when nothing was elected.
    pub fn k(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[BTreeSet<Asn>] {
        &self.levels
    }

    pub fn level(&self, i: usize) -> Option<&BTreeSet<Asn>> {
        self.levels.get(i)
    }

    pub fn contains(&self, level: usize, asn: Asn) -> bool {
        self.levels.get(level).map(|l| l.contains(&asn)).unwrap_or(false)
    }

    /// A_{k-1}: landmarks present in every bunch.
    pub fn top_level(&self) -> Option<&BTreeSet<Asn>> {
        if self.levels.len() < 2 {
            return None;
        }
        self.levels.get(self.levels.len() - 2)
    }

    pub fn top_level_len(&self) -> usize {
        self.top_level().map(|l| l.len()).unwrap_or(0)
    }

    /// Landmarks of level `i` that are not in level `i + 1`.
    pub fn retiring(&self, i: usize) -> Vec<Asn> {
        match (self.levels.get(i), self.levels.get(i + 1)) {
            (Some(current), Some(next)) => current.difference(next).copied().collect(),
            (Some(current), None) => current.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// The subset of `candidates` belonging to `level`.
    pub fn filter_by_level<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a Asn>,
        level: usize,
    ) -> BTreeSet<Asn> {
        match self.levels.get(level) {
            Some(members) => candidates
                .into_iter()
                .filter(|asn| members.contains(asn))
                .copied()
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Containment check over all levels: A_0 = V, A_{i+1} ⊆ A_i, A_k = ∅.
    pub fn validate(&self, topology: &Topology) -> std::result::Result<(), String> {
        let all: BTreeSet<Asn> = topology.asns().collect();
        match self.levels.first() {
            Some(first) if *first == all => {}
            _ => return Err("level 0 differs from the node set".to_string()),
        }
        for (i, pair) in self.levels.windows(2).enumerate() {
            if !pair[1].is_subset(&pair[0]) {
                return Err(format!("level {} not contained in level {}", i + 1, i));
            }
        }
        match self.levels.last() {
            Some(last) if last.is_empty() && self.levels.len() >= 2 => Ok(()),
            _ => Err("level k is not empty".to_string()),
        }
    }
}
