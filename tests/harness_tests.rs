//! Tests for the measurement harness
//!
//! Runs the oracle against the path-vector baseline on a small provider
//! hierarchy and checks the reports and the CSV logs they leave behind.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use tempfile::TempDir;
use tz_oracle::harness::{
    measure_chosen_deletions_stretch, measure_deletion_stretch, measure_endpoint_degrees,
    measure_landmark_level_after_deletion, measure_random_deletions_stretch, measure_stretch,
    SAMPLES_PER_ROUND,
};
use tz_oracle::recorder::Recorder;
use tz_oracle::{
    Asn, BgpGraph, LandmarkHierarchy, Relationship, RoutingModel, TZConfig, TZOracle, Topology,
    ValleyCheck,
};

/// Complete graph on `1..=n` where lower ASNs provide transit to higher
/// ones, so every pair has a valley-free route.
fn tiered_clique(n: Asn) -> Topology {
    let mut t = Topology::new();
    for a in 1..=n {
        for b in (a + 1)..=n {
            t.add_edge(a, b, Relationship::Customer);
        }
    }
    t
}

fn oracle_for(t: &Topology) -> TZOracle {
    let levels: Vec<BTreeSet<Asn>> = vec![
        t.asns().collect(),
        [1, 2, 3].into_iter().collect(),
        [1].into_iter().collect(),
    ];
    let mut oracle = TZOracle::new(t.clone(), TZConfig { k: 3, seed: 9 });
    oracle
        .set_hierarchy(LandmarkHierarchy::from_levels(t, levels).unwrap())
        .unwrap();
    oracle.preprocess().unwrap();
    oracle
}

fn csv_rows(path: &std::path::Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

#[test]
fn test_stretch_against_baseline_is_logged() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("stretch.csv");
    let recorder = Recorder::create(&log).unwrap();

    let t = tiered_clique(10);
    let oracle = oracle_for(&t);
    let baseline = BgpGraph::new(t);

    let report = measure_stretch(&baseline, &oracle, 3, 20, 1, ValleyCheck::Lax, Some(&recorder))
        .unwrap();
    assert_eq!(report.samples, 60);
    assert!(!recorder.is_active());

    let rows = csv_rows(&log);
    assert_eq!(rows.len(), 60);
    for row in &rows {
        assert_eq!(row.len(), 7);
        let base: usize = row[0].parse().unwrap();
        let audit: usize = row[1].parse().unwrap();
        // one hop in the clique, at most 2k - 1 for the oracle
        assert!(base <= 1);
        assert!(audit <= 5);
        assert!(row[2] == "0" || row[2] == "1");
    }
    // the models handed in are untouched
    assert_eq!(baseline.pending(), 0);
}

#[test]
fn test_deletion_stretch_samples() {
    let t = tiered_clique(8);
    let oracle = oracle_for(&t);
    let baseline = BgpGraph::new(t);
    let mut rng = StdRng::seed_from_u64(4);

    let report = measure_deletion_stretch(&baseline, &oracle, 5, &mut rng, None).unwrap();
    assert_eq!(report.samples, 5);
    assert_eq!(report.restarts, 0);
    assert!(report.average_increase > 0.0);
    assert!(report.max_increase >= report.average_increase);
    assert_eq!(oracle.count_links(), 28);
}

#[test]
fn test_landmark_levels_are_tracked() {
    let t = tiered_clique(8);
    let oracle = oracle_for(&t);
    let baseline = BgpGraph::new(t);
    let mut rng = StdRng::seed_from_u64(8);

    let samples =
        measure_landmark_level_after_deletion(&baseline, &oracle, 4, &mut rng, None).unwrap();
    assert_eq!(samples.len(), 4);
    for sample in &samples {
        assert!(sample.level_before < 3 && sample.level_after < 3);
        assert!(sample.hops_before >= 1);
        // the direct link is gone
        assert!(sample.hops_after >= 2);
    }
}

#[test]
fn test_random_deletion_rounds() {
    let dir = TempDir::new().unwrap();
    let recorder = Recorder::create(dir.path().join("rounds.csv")).unwrap();

    let t = tiered_clique(12);
    let mut oracle = oracle_for(&t);
    let mut baseline = BgpGraph::new(t);
    let mut rng = StdRng::seed_from_u64(12);

    let report = measure_random_deletions_stretch(
        &mut baseline,
        &mut oracle,
        2,
        0.05,
        ValleyCheck::Lax,
        &mut rng,
        Some(&recorder),
    )
    .unwrap();

    assert_eq!(report.samples, 2);
    // 66 links, 5% deleted once
    assert_eq!(oracle.count_links(), 63);
    assert_eq!(RoutingModel::count_links(&baseline), 63);
    assert!(oracle.verify_invariants().is_empty());
    assert!(dir.path().join("missing-edges-2x0.050.csv").exists());

    let rows = csv_rows(&dir.path().join("rounds.csv"));
    assert_eq!(rows[0], vec!["-0", "-0", "-0"]);
    assert!(rows.len() > SAMPLES_PER_ROUND);
}

#[test]
fn test_chosen_deletion_rounds() {
    let t = tiered_clique(8);
    let mut oracle = oracle_for(&t);
    let mut baseline = BgpGraph::new(t);
    let mut rng = StdRng::seed_from_u64(3);

    let deletions = [(4, 5), (6, 7), (2, 8), (40, 41)];
    let report = measure_chosen_deletions_stretch(
        &mut baseline,
        &mut oracle,
        2,
        &deletions,
        ValleyCheck::Strict,
        &mut rng,
        None,
    )
    .unwrap();

    assert_eq!(report.samples, 3);
    assert_eq!(oracle.count_links(), 25);
    assert!(!oracle.topology().has_edge(2, 8));
}

#[test]
fn test_endpoint_degrees_cover_every_link() {
    let t = tiered_clique(6);
    let oracle = oracle_for(&t);
    let degrees = measure_endpoint_degrees(&oracle, None).unwrap();
    assert_eq!(degrees.len(), 30);
    assert!(degrees.iter().all(|&(a, b)| a == 5 && b == 5));
}
