//! Common surface of the routing schemes compared by the harness.

use crate::bgp::BgpGraph;
use crate::error::{OracleError, Result};
use crate::oracle::TZOracle;
use crate::repair::RepairOutcome;
use crate::topology::{Asn, Route, Topology};

/// A routing scheme that can be queried, announced to and damaged.
///
/// Harness rounds clone the models inside worker tasks, hence
/// `Clone + Send + Sync`.
pub trait RoutingModel: Clone + Send + Sync {
    fn name(&self) -> &'static str;

    fn topology(&self) -> &Topology;

    /// Declares destinations that routes will be asked for.
    fn set_destinations(&mut self, destinations: &[Asn]);

    fn delete_destination(&mut self, destination: Asn);

    /// Brings the scheme to a stable state; returns the messages exchanged.
    fn evolve(&mut self) -> usize;

    /// Route from `origin` to `destination`, `None` when the scheme has none.
    fn get_route(&self, origin: Asn, destination: Asn) -> Result<Option<Route>>;

    fn remove_edge(&mut self, a: Asn, b: Asn) -> Result<RepairOutcome>;

    fn count_links(&self) -> usize {
        self.topology().count_links()
    }
}

impl RoutingModel for TZOracle {
    fn name(&self) -> &'static str {
        "tz"
    }

    fn topology(&self) -> &Topology {
        TZOracle::topology(self)
    }

    // routes exist for every pair once preprocessed
    fn set_destinations(&mut self, _destinations: &[Asn]) {}

    fn delete_destination(&mut self, _destination: Asn) {}

    fn evolve(&mut self) -> usize {
        0
    }

    fn get_route(&self, origin: Asn, destination: Asn) -> Result<Option<Route>> {
        match TZOracle::get_route(self, origin, destination) {
            Ok(route) => Ok(Some(route)),
            Err(OracleError::UnknownNode(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove_edge(&mut self, a: Asn, b: Asn) -> Result<RepairOutcome> {
        TZOracle::remove_edge(self, a, b)
    }
}

impl RoutingModel for BgpGraph {
    fn name(&self) -> &'static str {
        "bgp"
    }

    fn topology(&self) -> &Topology {
        BgpGraph::topology(self)
    }

    fn set_destinations(&mut self, destinations: &[Asn]) {
        BgpGraph::set_destinations(self, destinations.iter().copied());
    }

    fn delete_destination(&mut self, destination: Asn) {
        BgpGraph::delete_destination(self, destination);
    }

    fn evolve(&mut self) -> usize {
        BgpGraph::evolve(self)
    }

    fn get_route(&self, origin: Asn, destination: Asn) -> Result<Option<Route>> {
        Ok(BgpGraph::get_route(self, origin, destination))
    }

    fn remove_edge(&mut self, a: Asn, b: Asn) -> Result<RepairOutcome> {
        BgpGraph::remove_edge(self, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkHierarchy;
    use crate::oracle::TZConfig;
    use crate::topology::Relationship;

    fn square() -> Topology {
        let mut t = Topology::new();
        t.add_edge(1, 2, Relationship::Peer);
        t.add_edge(2, 3, Relationship::Peer);
        t.add_edge(3, 4, Relationship::Peer);
        t.add_edge(4, 1, Relationship::Peer);
        t
    }

    fn routes_between<M: RoutingModel>(model: &mut M, a: Asn, b: Asn) -> Option<Route> {
        model.set_destinations(&[b]);
        model.evolve();
        model.get_route(a, b).unwrap()
    }

    fn assert_shared_across_workers<M: RoutingModel>() {}

    #[test]
    fn test_models_are_shared_across_workers() {
        assert_shared_across_workers::<TZOracle>();
        assert_shared_across_workers::<BgpGraph>();

        // workers clone from a shared borrow, as measurement rounds do
        let bgp = BgpGraph::new(square());
        let links: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(|| RoutingModel::count_links(&bgp.clone())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(links, vec![4, 4]);
    }

    #[test]
    fn test_both_models_answer() {
        let t = square();
        let hierarchy =
            LandmarkHierarchy::from_levels(&t, vec![(1..=4).collect(), [1].into_iter().collect()])
                .unwrap();
        let mut tz = TZOracle::new(t.clone(), TZConfig::default());
        tz.set_hierarchy(hierarchy).unwrap();
        tz.preprocess().unwrap();
        let mut bgp = BgpGraph::new(t);

        let tz_route = routes_between(&mut tz, 1, 2).unwrap();
        let bgp_route = routes_between(&mut bgp, 1, 2).unwrap();
        assert_eq!(tz_route.nodes.first(), bgp_route.nodes.first());
        assert_eq!(tz_route.nodes.last(), bgp_route.nodes.last());
        assert_eq!(RoutingModel::count_links(&tz), 4);
        assert_eq!(tz.name(), "tz");
        assert_eq!(bgp.name(), "bgp");
        assert!(RoutingModel::get_route(&tz, 1, 99).unwrap().is_none());
    }
}
