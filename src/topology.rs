//! AS-level topology: nodes, typed links and routes.
//!
//! Every link is stored at both endpoints. Each node keeps its neighbor
//! list sorted ascending with a parallel list of relationship types, so
//! `neighbor_type` is a binary search.

use crate::error::{OracleError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

/// Autonomous system number.
pub type Asn = u32;

/// Commercial relationship of a neighbor, seen from the node holding the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relationship {
    /// The neighbor is a customer of this node
    Customer,
    /// Settlement-free peering
    Peer,
    /// The neighbor is a provider of this node
    Provider,
}

impl Relationship {
    /// Code used in topology files: Provider=1, Peer=0, Customer=-1.
    pub fn code(self) -> i8 {
        match self {
            Relationship::Provider => 1,
            Relationship::Peer => 0,
            Relationship::Customer => -1,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(Relationship::Provider),
            0 => Some(Relationship::Peer),
            -1 => Some(Relationship::Customer),
            _ => None,
        }
    }

    /// The same link seen from the other endpoint.
    pub fn inverse(self) -> Self {
        match self {
            Relationship::Provider => Relationship::Customer,
            Relationship::Peer => Relationship::Peer,
            Relationship::Customer => Relationship::Provider,
        }
    }

    /// Direction of travel when following this link: up, across or down.
    pub fn symbol(self) -> &'static str {
        match self {
            Relationship::Provider => "^",
            Relationship::Peer => "=",
            Relationship::Customer => "v",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relationship::Provider => write!(f, "provider"),
            Relationship::Peer => write!(f, "peer"),
            Relationship::Customer => write!(f, "customer"),
        }
    }
}

/// An AS with its sorted adjacency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub asn: Asn,
    links: Vec<Asn>,
    kinds: Vec<Relationship>,
}

impl Node {
    pub fn new(asn: Asn) -> Self {
        Self {
            asn,
            links: Vec::new(),
            kinds: Vec::new(),
        }
    }

    /// Neighbor identifiers, ascending.
    pub fn links(&self) -> &[Asn] {
        &self.links
    }

    /// Relationship types, co-indexed with `links()`.
    pub fn kinds(&self) -> &[Relationship] {
        &self.kinds
    }

    pub fn degree(&self) -> usize {
        self.links.len()
    }

    pub fn neighbor_index(&self, neighbor: Asn) -> Option<usize> {
        self.links.binary_search(&neighbor).ok()
    }

    pub fn has_link(&self, neighbor: Asn) -> bool {
        self.neighbor_index(neighbor).is_some()
    }

    /// Relationship with `neighbor`, or `None` when there is no such link.
    pub fn neighbor_type(&self, neighbor: Asn) -> Option<Relationship> {
        self.neighbor_index(neighbor).map(|idx| self.kinds[idx])
    }

    /// Inserts a link keeping the list sorted. Returns false if it already existed.
    pub fn insert_link(&mut self, neighbor: Asn, kind: Relationship) -> bool {
        match self.links.binary_search(&neighbor) {
            Ok(_) => false,
            Err(idx) => {
                self.links.insert(idx, neighbor);
                self.kinds.insert(idx, kind);
                true
            }
        }
    }

    /// Removes a link. Returns false if it did not exist.
    pub fn delete_link(&mut self, neighbor: Asn) -> bool {
        match self.neighbor_index(neighbor) {
            Some(idx) => {
                self.links.remove(idx);
                self.kinds.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Gao-Rexford export rule: may this node reveal a route learned from
    /// `subject` to `target`? Routes originated by the node itself can
    /// always be announced. Returns `None` if either is not a neighbor.
    pub fn can_tell_about(&self, subject: Asn, target: Asn) -> Option<bool> {
        if subject == self.asn {
            return Some(true);
        }
        let heard_from = self.neighbor_type(subject)?;
        let advertised_to = self.neighbor_type(target)?;

        Some(match advertised_to {
            Relationship::Customer => true,
            Relationship::Peer | Relationship::Provider => heard_from == Relationship::Customer,
        })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS {}: ({} links)", self.asn, self.links.len())
    }
}

/// A route through the topology. `nodes` is one element longer than `links`:
/// `links[i]` is the relationship of `nodes[i + 1]` as seen from `nodes[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub nodes: Vec<Asn>,
    pub links: Vec<Relationship>,
}

impl Route {
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Path rendered as `1 ^ 2 = 3 v 4`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (idx, asn) in self.nodes.iter().enumerate() {
            if idx > 0 {
                out.push(' ');
                out.push_str(self.links.get(idx - 1).map(|l| l.symbol()).unwrap_or(">"));
                out.push(' ');
            }
            out.push_str(&asn.to_string());
        }
        out
    }
}

/// The undirected AS graph. Owns every `Node`; everything else refers to
/// nodes by `Asn`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    nodes: BTreeMap<Asn, Node>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a topology from `(node, neighbor, relationship)` rows. Each
    /// link must be listed from both sides with inverse relationships.
    pub fn from_rows(rows: impl IntoIterator<Item = (Asn, Asn, Relationship)>) -> Result<Self> {
        let mut topology = Topology::new();
        for (asn, neighbor, kind) in rows {
            if asn == neighbor {
                return Err(OracleError::InvalidTopology(format!("self-loop on AS{}", asn)));
            }
            topology
                .nodes
                .entry(asn)
                .or_insert_with(|| Node::new(asn))
                .insert_link(neighbor, kind);
        }
        topology.validate_symmetry()?;
        Ok(topology)
    }

    /// Checks that every link is present at both endpoints with inverse types.
    pub fn validate_symmetry(&self) -> Result<()> {
        for node in self.nodes.values() {
            for (&neighbor, &kind) in node.links.iter().zip(node.kinds.iter()) {
                let other = self.nodes.get(&neighbor).ok_or_else(|| {
                    OracleError::InvalidTopology(format!(
                        "AS{} links to missing AS{}",
                        node.asn, neighbor
                    ))
                })?;
                match other.neighbor_type(node.asn) {
                    Some(back) if back == kind.inverse() => {}
                    Some(back) => {
                        return Err(OracleError::InvalidTopology(format!(
                            "link {}-{} typed {} but {} on the other side",
                            node.asn, neighbor, kind, back
                        )))
                    }
                    None => {
                        return Err(OracleError::InvalidTopology(format!(
                            "link {}-{} present at one endpoint only",
                            node.asn, neighbor
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Adds a link; `kind` is the relationship of `b` as seen from `a`.
    /// Returns false if the link already existed.
    pub fn add_edge(&mut self, a: Asn, b: Asn, kind: Relationship) -> bool {
        if a == b || self.has_edge(a, b) {
            return false;
        }
        self.nodes.entry(a).or_insert_with(|| Node::new(a)).insert_link(b, kind);
        self.nodes
            .entry(b)
            .or_insert_with(|| Node::new(b))
            .insert_link(a, kind.inverse());
        true
    }

    /// Removes the link from both endpoints.
    ///
    /// Returns `Ok(false)` if the link does not exist at all and an
    /// invariant violation if only one endpoint knew about it.
    /// The graph is left untouched on error.
    pub fn remove_link_pair(&mut self, a: Asn, b: Asn) -> Result<bool> {
        match (self.has_edge(a, b), self.has_edge(b, a)) {
            (false, false) => return Ok(false),
            (true, true) => {}
            _ => {
                return Err(OracleError::invariant(format!(
                    "link {}-{} is known to one side only, corrupted graph",
                    a, b
                )))
            }
        }
        for (endpoint, other) in [(a, b), (b, a)] {
            if let Some(node) = self.nodes.get_mut(&endpoint) {
                node.delete_link(other);
            }
        }
        Ok(true)
    }

    pub fn has_edge(&self, a: Asn, b: Asn) -> bool {
        self.nodes.get(&a).map(|n| n.has_link(b)).unwrap_or(false)
    }

    pub fn contains(&self, asn: Asn) -> bool {
        self.nodes.contains_key(&asn)
    }

    pub fn node(&self, asn: Asn) -> Option<&Node> {
        self.nodes.get(&asn)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn asns(&self) -> impl Iterator<Item = Asn> + '_ {
        self.nodes.keys().copied()
    }

    /// Neighbors of `asn`; empty for unknown nodes.
    pub fn neighbors(&self, asn: Asn) -> &[Asn] {
        self.nodes.get(&asn).map(|n| n.links()).unwrap_or(&[])
    }

    pub fn degree(&self, asn: Asn) -> usize {
        self.neighbors(asn).len()
    }

    pub fn neighbor_type(&self, a: Asn, b: Asn) -> Option<Relationship> {
        self.nodes.get(&a)?.neighbor_type(b)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of undirected links.
    pub fn count_links(&self) -> usize {
        self.nodes.values().map(|n| n.degree()).sum::<usize>() / 2
    }

    /// Relationship sequence along a node path; `None` if two consecutive
    /// nodes are not adjacent.
    pub fn link_types(&self, path: &[Asn]) -> Option<Vec<Relationship>> {
        path.windows(2)
            .map(|pair| self.neighbor_type(pair[0], pair[1]))
            .collect()
    }

    pub fn random_node<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Asn> {
        if self.nodes.is_empty() {
            return None;
        }
        let stop = rng.gen_range(0..self.nodes.len());
        self.nodes.keys().nth(stop).copied()
    }

    /// A link chosen uniformly among directed links, as `(endpoint, other)`.
    pub fn random_link<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(Asn, Asn)> {
        let directed = self.count_links() * 2;
        if directed == 0 {
            return None;
        }
        let mut stop = rng.gen_range(0..directed);
        for node in self.nodes.values() {
            if stop < node.degree() {
                return Some((node.asn, node.links[stop]));
            }
            stop -= node.degree();
        }
        None
    }

    /// Exact hop distances from `source` (BFS).
    pub fn bfs_distances(&self, source: Asn) -> HashMap<Asn, u32> {
        let mut distances = HashMap::new();
        if !self.contains(source) {
            return distances;
        }
        let mut queue = VecDeque::new();
        distances.insert(source, 0);
        queue.push_back(source);

        while let Some(current) = queue.pop_front() {
            let current_dist = distances[&current];
            for &neighbor in self.neighbors(current) {
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor, current_dist + 1);
                    queue.push_back(neighbor);
                }
            }
        }

        distances
    }

    /// True when every node is reachable from every other node.
    pub fn is_connected(&self) -> bool {
        match self.nodes.keys().next() {
            Some(&first) => self.bfs_distances(first).len() == self.nodes.len(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn diamond() -> Topology {
        // 1 is provider of 2 and 3, 2 and 3 peer, 4 is customer of 2 and 3
        let mut t = Topology::new();
        t.add_edge(2, 1, Relationship::Provider);
        t.add_edge(3, 1, Relationship::Provider);
        t.add_edge(2, 3, Relationship::Peer);
        t.add_edge(4, 2, Relationship::Provider);
        t.add_edge(4, 3, Relationship::Provider);
        t
    }

    #[test]
    fn test_links_stay_sorted() {
        let mut node = Node::new(10);
        node.insert_link(30, Relationship::Peer);
        node.insert_link(5, Relationship::Customer);
        node.insert_link(20, Relationship::Provider);
        assert_eq!(node.links(), &[5, 20, 30]);
        assert_eq!(
            node.kinds(),
            &[Relationship::Customer, Relationship::Provider, Relationship::Peer]
        );
        assert!(!node.insert_link(20, Relationship::Peer));
    }

    #[test]
    fn test_neighbor_type_lookup() {
        let t = diamond();
        assert_eq!(t.neighbor_type(2, 1), Some(Relationship::Provider));
        assert_eq!(t.neighbor_type(1, 2), Some(Relationship::Customer));
        assert_eq!(t.neighbor_type(2, 3), Some(Relationship::Peer));
        assert_eq!(t.neighbor_type(1, 4), None);
        assert_eq!(t.neighbor_type(99, 1), None);
    }

    #[test]
    fn test_remove_link_pair() {
        let mut t = diamond();
        assert_eq!(t.count_links(), 5);
        assert!(t.remove_link_pair(2, 3).unwrap());
        assert!(!t.has_edge(2, 3));
        assert!(!t.has_edge(3, 2));
        assert_eq!(t.count_links(), 4);
        assert!(!t.remove_link_pair(2, 3).unwrap());
    }

    #[test]
    fn test_one_sided_link_is_invariant_violation() {
        let mut t = diamond();
        // corrupt: drop the link on one side only
        t.nodes.get_mut(&2).unwrap().delete_link(3);
        let before = t.clone();
        let err = t.remove_link_pair(2, 3).unwrap_err();
        assert!(err.is_invariant_violation());
        // the surviving half is kept as evidence
        assert_eq!(t, before);
        assert!(t.has_edge(3, 2));
        assert!(t.validate_symmetry().is_err());
        assert!(t.remove_link_pair(3, 2).unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_from_rows_rejects_asymmetric() {
        let rows = vec![(1, 2, Relationship::Peer)];
        assert!(Topology::from_rows(rows).is_err());

        let rows = vec![(1, 2, Relationship::Customer), (2, 1, Relationship::Provider)];
        let t = Topology::from_rows(rows).unwrap();
        assert_eq!(t.count_links(), 1);
    }

    #[test]
    fn test_can_tell_about() {
        let t = diamond();
        let two = t.node(2).unwrap();
        // own routes go everywhere
        assert_eq!(two.can_tell_about(2, 1), Some(true));
        // customer-learned routes go everywhere
        assert_eq!(two.can_tell_about(4, 1), Some(true));
        assert_eq!(two.can_tell_about(4, 3), Some(true));
        // provider-learned routes only to customers
        assert_eq!(two.can_tell_about(1, 3), Some(false));
        assert_eq!(two.can_tell_about(1, 4), Some(true));
        // peer-learned routes not to providers
        assert_eq!(two.can_tell_about(3, 1), Some(false));
        assert_eq!(two.can_tell_about(99, 1), None);
    }

    #[test]
    fn test_random_link_is_an_edge() {
        let t = diamond();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let (a, b) = t.random_link(&mut rng).unwrap();
            assert!(t.has_edge(a, b));
        }
    }

    #[test]
    fn test_route_render() {
        let t = diamond();
        let nodes = vec![4, 2, 3, 1];
        let links = t.link_types(&nodes).unwrap();
        let route = Route { nodes, links };
        assert_eq!(route.render(), "4 ^ 2 = 3 ^ 1");
        assert_eq!(route.hops(), 3);
        assert!(t.link_types(&[4, 1]).is_none());
    }

    #[test]
    fn test_bfs_distances() {
        let t = diamond();
        let d = t.bfs_distances(4);
        assert_eq!(d[&4], 0);
        assert_eq!(d[&2], 1);
        assert_eq!(d[&1], 2);
        assert!(t.is_connected());
    }
}
