//! Multi-source Dijkstra over the bucketed frontier.

use crate::error::Result;
use crate::frontier::{DistanceRecord, Frontier, EDGE_WEIGHT};
use crate::topology::{Asn, Topology};
use std::collections::{HashMap, HashSet};

/// Shortest-path records keyed by the node they describe.
pub type DijkstraTable = HashMap<Asn, DistanceRecord>;

/// Drains `frontier`, relaxing every neighbor accepted by
/// `admit(neighbor, candidate_distance)`.
///
/// Records already present in `table` are relaxed in place (removed from
/// the frontier and reinserted at the smaller distance); new neighbors
/// inherit the parent landmark of the node they were reached from.
pub fn run_dijkstra<F>(
    topology: &Topology,
    table: &mut DijkstraTable,
    frontier: &mut Frontier,
    mut admit: F,
) -> Result<()>
where
    F: FnMut(Asn, u32) -> bool,
{
    while let Some(expand_from) = frontier.extract_min() {
        let updated_distance = expand_from.distance + EDGE_WEIGHT;

        for &neighbor in topology.neighbors(expand_from.reference) {
            if !admit(neighbor, updated_distance) {
                continue;
            }

            match table.get_mut(&neighbor) {
                Some(existing) => {
                    if existing.distance > updated_distance {
                        frontier.remove(existing);
                        *existing = expand_from.extended_to(neighbor);
                        frontier.insert(*existing)?;
                    }
                }
                None => {
                    let record = expand_from.extended_to(neighbor);
                    table.insert(neighbor, record);
                    frontier.insert(record)?;
                }
            }
        }
    }

    Ok(())
}

/// Admission predicate restricting the search to an induced subgraph.
pub fn within(zone: &HashSet<Asn>) -> impl FnMut(Asn, u32) -> bool + '_ {
    move |asn, _| zone.contains(&asn)
}

/// Single-landmark search seeded with `sources`, each carrying its own record.
pub fn seeded_frontier(sources: impl IntoIterator<Item = DistanceRecord>) -> Result<Frontier> {
    let mut frontier = Frontier::new();
    for record in sources {
        frontier.insert(record)?;
    }
    Ok(frontier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Relationship;

    fn path_graph(n: Asn) -> Topology {
        let mut t = Topology::new();
        for i in 1..n {
            t.add_edge(i, i + 1, Relationship::Peer);
        }
        t
    }

    #[test]
    fn test_multi_source_nearest_landmark() {
        let t = path_graph(7);
        let mut table = DijkstraTable::new();
        for root in [1, 7] {
            table.insert(root, DistanceRecord::root(root));
        }
        let mut frontier = Frontier::with_roots([1, 7]);
        run_dijkstra(&t, &mut table, &mut frontier, |_, _| true).unwrap();

        assert_eq!(table.len(), 7);
        assert_eq!(table[&2].parent, 1);
        assert_eq!(table[&2].next_hop, 1);
        assert_eq!(table[&6].parent, 7);
        assert_eq!(table[&3].distance, 2);
        assert_eq!(table[&4].distance, 3);
    }

    #[test]
    fn test_zone_restriction() {
        let t = path_graph(5);
        let zone: HashSet<Asn> = [1, 2, 3].into_iter().collect();
        let mut table = DijkstraTable::new();
        table.insert(1, DistanceRecord::root(1));
        let mut frontier = Frontier::with_roots([1]);
        run_dijkstra(&t, &mut table, &mut frontier, within(&zone)).unwrap();
        assert_eq!(table.len(), 3);
        assert!(!table.contains_key(&4));
    }

    #[test]
    fn test_relaxation_through_shortcut() {
        // square 1-2-3-4-1 seeded with a stale far record at 3
        let mut t = path_graph(4);
        t.add_edge(4, 1, Relationship::Peer);
        let mut table = DijkstraTable::new();
        table.insert(1, DistanceRecord::root(1));
        let stale = DistanceRecord {
            reference: 3,
            distance: 5,
            parent: 1,
            next_hop: 2,
        };
        table.insert(3, stale);
        let mut frontier = seeded_frontier([DistanceRecord::root(1), stale]).unwrap();
        run_dijkstra(&t, &mut table, &mut frontier, |_, _| true).unwrap();
        assert_eq!(table[&3].distance, 2);
        assert!(frontier.is_empty());
    }
}
