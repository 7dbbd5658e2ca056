//! Path-vector baseline with Gao-Rexford export rules and route preference.
//!
//! Every speaker keeps one route per announced destination. Activating an
//! unstable speaker advertises its fresh routes to every neighbor the
//! export rule allows; `evolve` keeps activating until nothing changes.

use crate::error::Result;
use crate::repair::{RepairOutcome, RepairStatus};
use crate::topology::{Asn, Node, Relationship, Route, Topology};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// A speaker's route toward one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpRoute {
    pub next_hop: Asn,
    pub length: u32,
    /// Changed since the speaker last advertised it
    pub fresh: bool,
}

/// Routing table of one AS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Speaker {
    routes: BTreeMap<Asn, BgpRoute>,
}

impl Speaker {
    pub fn route(&self, destination: Asn) -> Option<&BgpRoute> {
        self.routes.get(&destination)
    }

    pub fn routes(&self) -> impl Iterator<Item = (Asn, &BgpRoute)> {
        self.routes.iter().map(|(&dest, route)| (dest, route))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Type of the first hop as seen from `node`; own routes count as
    /// customer routes.
    fn next_hop_type(node: &Node, route: &BgpRoute) -> Relationship {
        if route.length == 0 {
            return Relationship::Customer;
        }
        node.neighbor_type(route.next_hop).unwrap_or(Relationship::Provider)
    }

    /// Handles an advertisement of `destination` at distance `length` from
    /// `from`. Returns true when the route table changed.
    fn advertise(
        &mut self,
        node: &Node,
        destination: Asn,
        from: Asn,
        length: u32,
    ) -> bool {
        let offered = BgpRoute {
            next_hop: from,
            length: length + 1,
            fresh: true,
        };

        match self.routes.get_mut(&destination) {
            None => {
                self.routes.insert(destination, offered);
                true
            }
            Some(current) => {
                let current_type = Self::next_hop_type(node, current);
                let offered_type = node.neighbor_type(from).unwrap_or(Relationship::Provider);
                // customer < peer < provider, then shorter
                if offered_type < current_type
                    || (offered_type == current_type && offered.length < current.length)
                {
                    *current = offered;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// How strictly a finished route is checked against the no-valley rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValleyCheck {
    /// No climb toward a provider after descending to a customer
    Lax,
    /// Climb, at most one peer link, then only descend
    Strict,
}

/// Audits a relationship sequence against the no-valley rule.
pub fn respects_no_valley(links: &[Relationship], mode: ValleyCheck) -> bool {
    match mode {
        ValleyCheck::Lax => {
            let mut gone_down = false;
            for &link in links {
                gone_down = gone_down || link == Relationship::Customer;
                if gone_down && link == Relationship::Provider {
                    return false;
                }
            }
            true
        }
        ValleyCheck::Strict => {
            let mut plateau = false;
            for &link in links {
                match link {
                    Relationship::Provider if plateau => return false,
                    Relationship::Provider => {}
                    Relationship::Peer if plateau => return false,
                    Relationship::Peer | Relationship::Customer => plateau = true,
                }
            }
            true
        }
    }
}

/// The baseline simulator.
#[derive(Debug, Clone)]
pub struct BgpGraph {
    topology: Topology,
    speakers: HashMap<Asn, Speaker>,
    unstable: BTreeSet<Asn>,
}

impl BgpGraph {
    pub fn new(topology: Topology) -> Self {
        let speakers = topology.asns().map(|asn| (asn, Speaker::default())).collect();
        Self {
            topology,
            speakers,
            unstable: BTreeSet::new(),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn speaker(&self, asn: Asn) -> Option<&Speaker> {
        self.speakers.get(&asn)
    }

    pub fn count_links(&self) -> usize {
        self.topology.count_links()
    }

    /// Number of speakers waiting for activation.
    pub fn pending(&self) -> usize {
        self.unstable.len()
    }

    /// Makes every listed AS originate a route to itself.
    pub fn set_destinations(&mut self, destinations: impl IntoIterator<Item = Asn>) {
        for destination in destinations {
            if let Some(speaker) = self.speakers.get_mut(&destination) {
                if !speaker.routes.contains_key(&destination) {
                    speaker.routes.insert(
                        destination,
                        BgpRoute {
                            next_hop: destination,
                            length: 0,
                            fresh: true,
                        },
                    );
                    self.unstable.insert(destination);
                }
            }
        }
    }

    /// Forgets every route toward `destination`.
    pub fn delete_destination(&mut self, destination: Asn) {
        for speaker in self.speakers.values_mut() {
            speaker.routes.remove(&destination);
        }
    }

    /// Advertises the fresh routes of `asn`. Returns the messages sent.
    pub fn activate(&mut self, asn: Asn) -> usize {
        self.unstable.remove(&asn);

        let Some(node) = self.topology.node(asn) else {
            return 0;
        };
        let fresh: Vec<(Asn, BgpRoute)> = match self.speakers.get_mut(&asn) {
            Some(speaker) => speaker
                .routes
                .iter_mut()
                .filter(|(_, route)| route.fresh)
                .map(|(&dest, route)| {
                    route.fresh = false;
                    (dest, *route)
                })
                .collect(),
            None => return 0,
        };

        let mut messages = 0;
        for (destination, route) in fresh {
            for &neighbor in node.links() {
                if neighbor == route.next_hop {
                    continue;
                }
                if node.can_tell_about(route.next_hop, neighbor) != Some(true) {
                    continue;
                }
                let (Some(receiver), Some(receiver_node)) =
                    (self.speakers.get_mut(&neighbor), self.topology.node(neighbor))
                else {
                    continue;
                };
                if receiver.advertise(receiver_node, destination, asn, route.length) {
                    self.unstable.insert(neighbor);
                }
                messages += 1;
            }
        }
        messages
    }

    /// Activates unstable speakers until the system is stable. Returns the
    /// total number of messages exchanged.
    pub fn evolve(&mut self) -> usize {
        let mut messages = 0;
        let mut round = 0;
        let round_limit = 2 * self.topology.len() + 2;

        while !self.unstable.is_empty() {
            if round >= round_limit {
                tracing::warn!(
                    rounds = round,
                    pending = self.unstable.len(),
                    "Baseline did not converge, stopping"
                );
                break;
            }
            let queued: Vec<Asn> = self.unstable.iter().copied().collect();
            tracing::trace!(round = round, queued = queued.len(), "Activation round");
            for asn in queued {
                messages += self.activate(asn);
            }
            round += 1;
        }

        messages
    }

    /// Follows next hops from `origin` toward `destination`.
    pub fn get_route(&self, origin: Asn, destination: Asn) -> Option<Route> {
        if !self.topology.contains(origin) || !self.topology.contains(destination) {
            return None;
        }

        let mut nodes = vec![origin];
        let mut links = Vec::new();
        let mut cursor = origin;
        while cursor != destination {
            if nodes.len() > self.topology.len() {
                tracing::warn!(origin = origin, destination = destination, "Forwarding loop");
                return None;
            }
            let speaker = self.speakers.get(&cursor)?;
            let route = speaker.route(destination)?;
            let node = self.topology.node(cursor)?;
            links.push(Speaker::next_hop_type(node, route));
            cursor = route.next_hop;
            nodes.push(cursor);
        }

        Some(Route { nodes, links })
    }

    /// Removes the link and re-announces every destination whose routes
    /// crossed it.
    pub fn remove_edge(&mut self, a: Asn, b: Asn) -> Result<RepairOutcome> {
        let acceptable = self.topology.contains(a)
            && self.topology.contains(b)
            && self.topology.degree(a) > 1
            && self.topology.degree(b) > 1
            && self.topology.has_edge(a, b);
        if !acceptable || !self.topology.remove_link_pair(a, b)? {
            return Ok(RepairOutcome::not_performed());
        }

        let mut affected: BTreeSet<Asn> = BTreeSet::new();
        for (endpoint, other) in [(a, b), (b, a)] {
            if let Some(speaker) = self.speakers.get(&endpoint) {
                affected.extend(
                    speaker
                        .routes()
                        .filter(|(_, route)| route.length > 0 && route.next_hop == other)
                        .map(|(dest, _)| dest),
                );
            }
        }

        let mut impacted = BTreeSet::new();
        for &destination in &affected {
            impacted.extend(
                self.speakers
                    .iter()
                    .filter(|(_, s)| s.route(destination).is_some())
                    .map(|(&asn, _)| asn),
            );
            self.delete_destination(destination);
        }
        self.set_destinations(affected.iter().copied());
        let messages = self.evolve();

        tracing::debug!(
            a = a,
            b = b,
            destinations = affected.len(),
            messages = messages,
            "Baseline routes re-announced"
        );

        Ok(RepairOutcome {
            status: RepairStatus::Repaired,
            impacted_nodes: impacted,
            disconnected_nodes: BTreeSet::new(),
            distance_profile: None,
        })
    }
}

impl fmt::Display for BgpRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) via {}", self.length, self.next_hop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 is the top provider of 2 and 3, which peer; 4 is a customer of 2,
    /// 5 a customer of 3.
    fn hierarchy() -> Topology {
        let mut t = Topology::new();
        t.add_edge(2, 1, Relationship::Provider);
        t.add_edge(3, 1, Relationship::Provider);
        t.add_edge(2, 3, Relationship::Peer);
        t.add_edge(4, 2, Relationship::Provider);
        t.add_edge(5, 3, Relationship::Provider);
        t
    }

    #[test]
    fn test_converges_to_valley_free_routes() {
        let mut graph = BgpGraph::new(hierarchy());
        graph.set_destinations([5]);
        let messages = graph.evolve();
        assert!(messages > 0);
        assert_eq!(graph.pending(), 0);

        let route = graph.get_route(4, 5).unwrap();
        // peer link preferred over climbing to the top provider
        assert_eq!(route.nodes, vec![4, 2, 3, 5]);
        assert_eq!(
            route.links,
            vec![Relationship::Provider, Relationship::Peer, Relationship::Customer]
        );
        assert!(respects_no_valley(&route.links, ValleyCheck::Strict));
    }

    #[test]
    fn test_peer_routes_not_exported_to_providers() {
        let mut graph = BgpGraph::new(hierarchy());
        graph.set_destinations([4]);
        graph.evolve();
        // 1 learns 4 from its customer 2, never via the peer link 3 -> 2
        let at_one = graph.speaker(1).unwrap().route(4).unwrap();
        assert_eq!(at_one.next_hop, 2);
        // 3 prefers the peer route over its provider
        assert_eq!(graph.speaker(3).unwrap().route(4).unwrap().next_hop, 2);
    }

    #[test]
    fn test_delete_destination() {
        let mut graph = BgpGraph::new(hierarchy());
        graph.set_destinations([5]);
        graph.evolve();
        graph.delete_destination(5);
        assert!(graph.get_route(4, 5).is_none());
        assert!(graph.speaker(5).unwrap().is_empty());
    }

    #[test]
    fn test_remove_edge_reroutes() {
        let mut graph = BgpGraph::new(hierarchy());
        graph.set_destinations([5]);
        graph.evolve();
        let outcome = graph.remove_edge(2, 3).unwrap();
        assert!(outcome.success());
        let route = graph.get_route(4, 5).unwrap();
        assert_eq!(route.nodes, vec![4, 2, 1, 3, 5]);
        // pendant link refused
        assert!(!graph.remove_edge(4, 2).unwrap().performed());
    }

    #[test]
    fn test_valley_modes() {
        use Relationship::*;
        assert!(respects_no_valley(&[Provider, Provider, Customer], ValleyCheck::Lax));
        assert!(!respects_no_valley(&[Customer, Provider], ValleyCheck::Lax));
        // two peer links pass the lax check only
        assert!(respects_no_valley(&[Peer, Peer], ValleyCheck::Lax));
        assert!(!respects_no_valley(&[Peer, Peer], ValleyCheck::Strict));
        assert!(!respects_no_valley(&[Peer, Provider], ValleyCheck::Strict));
        assert!(respects_no_valley(&[Provider, Peer, Customer], ValleyCheck::Strict));
        assert!(respects_no_valley(&[], ValleyCheck::Strict));
    }
}
