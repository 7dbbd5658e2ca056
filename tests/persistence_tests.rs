//! Tests for saving and restoring preprocessed oracle state
//!
//! A restored oracle must answer every query exactly like the instance that
//! was saved, without running preprocessing again.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use tz_oracle::persist::{load_topology, write_topology, OracleFiles};
use tz_oracle::{
    OracleError, Relationship, SelectionStrategy, StrategyKind, TZConfig, TZOracle, Topology,
};

/// Random connected topology on `1..=n` with providers at lower ASNs.
fn random_topology(n: u32, seed: u64) -> Topology {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = Topology::new();
    for i in 2..=n {
        let provider = rng.gen_range(1..i);
        t.add_edge(i, provider, Relationship::Provider);
    }
    for _ in 0..n {
        let a = rng.gen_range(1..=n);
        let b = rng.gen_range(1..=n);
        t.add_edge(a, b, Relationship::Peer);
    }
    t
}

fn saved_oracle(dir: &TempDir, name: &str) -> (TZOracle, OracleFiles) {
    let topology = random_topology(60, 5);
    let files = OracleFiles::for_dataset(dir.path(), name, StrategyKind::Random.code());
    write_topology(&files.topology, &topology).unwrap();

    let config = TZConfig { k: 3, seed: 17 };
    let mut oracle = TZOracle::new(load_topology(&files.topology).unwrap(), config);
    oracle.elect_landmarks(&SelectionStrategy::Random).unwrap();
    oracle.preprocess().unwrap();
    files.save(&oracle).unwrap();
    (oracle, files)
}

#[test]
fn test_restore_answers_like_the_original() {
    let dir = TempDir::new().unwrap();
    let (oracle, files) = saved_oracle(&dir, "random");

    let restored = files.restore(*oracle.config()).unwrap();
    assert_eq!(restored.topology(), oracle.topology());
    assert_eq!(restored.hierarchy(), oracle.hierarchy());
    assert_eq!(restored.witnesses(), oracle.witnesses());
    assert_eq!(restored.total_bunch_entries(), oracle.total_bunch_entries());
    assert!(restored.verify_invariants().is_empty());

    for origin in oracle.topology().asns() {
        for destination in oracle.topology().asns() {
            assert_eq!(
                restored.get_route(origin, destination).unwrap(),
                oracle.get_route(origin, destination).unwrap(),
                "route {} -> {}",
                origin,
                destination
            );
        }
    }
}

#[test]
fn test_restored_oracle_can_be_repaired() {
    let dir = TempDir::new().unwrap();
    let (mut oracle, files) = saved_oracle(&dir, "repair");
    let mut restored = files.restore(*oracle.config()).unwrap();

    let (a, b) = tz_oracle::harness::pick_link(oracle.topology(), 2, &mut StdRng::seed_from_u64(2))
        .unwrap();
    let expected = oracle.remove_edge(a, b).unwrap();
    let outcome = restored.remove_edge(a, b).unwrap();
    assert_eq!(outcome.status, expected.status);
    assert_eq!(restored.witnesses(), oracle.witnesses());
}

#[test]
fn test_truncated_bunches_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (oracle, files) = saved_oracle(&dir, "truncated");

    // drop every other node's entry for one top-level landmark
    let landmark = *oracle.hierarchy().top_level().unwrap().iter().next().unwrap();
    let content = std::fs::read_to_string(&files.bunches).unwrap();
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            fields[1] != landmark.to_string() || fields[0] == fields[1]
        })
        .collect();
    assert!(kept.len() < content.lines().count());
    std::fs::write(&files.bunches, kept.join("\n")).unwrap();

    match files.restore(*oracle.config()) {
        Err(OracleError::InvalidState(_)) => {}
        other => panic!("expected InvalidState, got {:?}", other.map(|o| o.k())),
    }
}

#[test]
fn test_missing_tables_are_io_errors() {
    let dir = TempDir::new().unwrap();
    let files = OracleFiles::for_dataset(dir.path(), "absent", 0);
    assert!(matches!(
        files.restore(TZConfig::default()),
        Err(OracleError::Io(_)) | Err(OracleError::Csv(_))
    ));
}
