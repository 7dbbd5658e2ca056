//! Headerless CSV persistence of the topology and the oracle tables.
//!
//! | file | row |
//! | --- | --- |
//! | topology | node, neighbor, relationship code |
//! | landmarks | level, node |
//! | witnesses | level, node, distance, landmark, next hop |
//! | bunches | owner, landmark, distance, next hop |
//!
//! Rows are sorted so that the same state always produces the same file.

use crate::cluster::Bunches;
use crate::error::{OracleError, Result};
use crate::frontier::DistanceRecord;
use crate::landmarks::{LandmarkHierarchy, NodeRanking};
use crate::oracle::{TZConfig, TZOracle};
use crate::topology::{Asn, Relationship, Topology};
use crate::witness::WitnessTable;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Row-oriented tabular form of a piece of oracle state.
pub trait Serializable {
    fn rows(&self) -> Vec<Vec<String>>;
}

impl Serializable for Topology {
    fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.count_links() * 2);
        for node in self.nodes() {
            for (neighbor, kind) in node.links().iter().zip(node.kinds()) {
                rows.push(vec![
                    node.asn.to_string(),
                    neighbor.to_string(),
                    kind.code().to_string(),
                ]);
            }
        }
        rows
    }
}

impl Serializable for LandmarkHierarchy {
    fn rows(&self) -> Vec<Vec<String>> {
        self.levels()
            .iter()
            .enumerate()
            .flat_map(|(level, members)| {
                members
                    .iter()
                    .map(move |asn| vec![level.to_string(), asn.to_string()])
            })
            .collect()
    }
}

impl Serializable for WitnessTable {
    fn rows(&self) -> Vec<Vec<String>> {
        let mut records: Vec<&DistanceRecord> = self.records().collect();
        records.sort_by_key(|r| r.reference);
        records
            .into_iter()
            .map(|r| {
                vec![
                    self.level().to_string(),
                    r.reference.to_string(),
                    r.distance.to_string(),
                    r.parent.to_string(),
                    r.next_hop.to_string(),
                ]
            })
            .collect()
    }
}

impl Serializable for Bunches {
    fn rows(&self) -> Vec<Vec<String>> {
        let mut records: Vec<&DistanceRecord> = self.records().collect();
        records.sort_by_key(|r| (r.reference, r.parent));
        records
            .into_iter()
            .map(|r| {
                vec![
                    r.reference.to_string(),
                    r.parent.to_string(),
                    r.distance.to_string(),
                    r.next_hop.to_string(),
                ]
            })
            .collect()
    }
}

/// Writes the rows of every payload, in order, to one file.
pub fn write_serializable(path: impl AsRef<Path>, payloads: &[&dyn Serializable]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path.as_ref())?;
    for payload in payloads {
        for row in payload.rows() {
            writer.write_record(&row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_rows(path: &Path) -> Result<Vec<csv::StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }
    Ok(rows)
}

fn field<T: FromStr>(row: &csv::StringRecord, idx: usize, path: &Path) -> Result<T> {
    let raw = row.get(idx).ok_or_else(|| {
        OracleError::InvalidState(format!(
            "{}: row {:?} has no column {}",
            path.display(),
            row,
            idx
        ))
    })?;
    raw.trim().parse().map_err(|_| {
        OracleError::InvalidState(format!(
            "{}: cannot parse {:?} in column {}",
            path.display(),
            raw,
            idx
        ))
    })
}

pub fn write_topology(path: impl AsRef<Path>, topology: &Topology) -> Result<()> {
    write_serializable(path, &[topology as &dyn Serializable])
}

/// Loads a topology file. Rows of one node must be contiguous.
pub fn load_topology(path: impl AsRef<Path>) -> Result<Topology> {
    let path = path.as_ref();
    let mut triples = Vec::new();
    let mut finished: BTreeSet<Asn> = BTreeSet::new();
    let mut current: Option<Asn> = None;

    for row in read_rows(path)? {
        let asn: Asn = field(&row, 0, path)?;
        let neighbor: Asn = field(&row, 1, path)?;
        let code: i8 = field(&row, 2, path)?;
        let kind = Relationship::from_code(code).ok_or_else(|| {
            OracleError::InvalidTopology(format!("relationship code {} on link {}-{}", code, asn, neighbor))
        })?;

        if current != Some(asn) {
            if let Some(previous) = current {
                finished.insert(previous);
            }
            if finished.contains(&asn) {
                return Err(OracleError::InvalidTopology(format!(
                    "rows of AS{} are not contiguous",
                    asn
                )));
            }
            current = Some(asn);
        }
        triples.push((asn, neighbor, kind));
    }

    let topology = Topology::from_rows(triples)?;
    tracing::info!(
        path = %path.display(),
        nodes = topology.len(),
        links = topology.count_links(),
        "Topology loaded"
    );
    Ok(topology)
}

pub fn write_landmarks(path: impl AsRef<Path>, hierarchy: &LandmarkHierarchy) -> Result<()> {
    write_serializable(path, &[hierarchy as &dyn Serializable])
}

/// Loads a depth-`k` hierarchy. Level `k` is implicitly empty.
pub fn load_landmarks(
    path: impl AsRef<Path>,
    topology: &Topology,
    k: usize,
) -> Result<LandmarkHierarchy> {
    let path = path.as_ref();
    if k < 1 {
        return Err(OracleError::InvalidDepth(k));
    }
    let mut levels: Vec<BTreeSet<Asn>> = vec![BTreeSet::new(); k + 1];
    for row in read_rows(path)? {
        let level: usize = field(&row, 0, path)?;
        let asn: Asn = field(&row, 1, path)?;
        let slot = levels.get_mut(level).ok_or_else(|| {
            OracleError::InvalidState(format!("landmark level {} exceeds k={}", level, k))
        })?;
        slot.insert(asn);
    }

    let hierarchy = LandmarkHierarchy::from_raw(levels);
    hierarchy
        .validate(topology)
        .map_err(OracleError::InvalidState)?;
    Ok(hierarchy)
}

pub fn write_witnesses(path: impl AsRef<Path>, witnesses: &[WitnessTable]) -> Result<()> {
    let payloads: Vec<&dyn Serializable> = witnesses.iter().map(|w| w as &dyn Serializable).collect();
    write_serializable(path, &payloads)
}

/// Loads the `k + 1` witness tables of a depth-`k` hierarchy.
pub fn load_witnesses(path: impl AsRef<Path>, k: usize) -> Result<Vec<WitnessTable>> {
    let path = path.as_ref();
    let mut records: Vec<HashMap<Asn, DistanceRecord>> = vec![HashMap::new(); k + 1];
    for row in read_rows(path)? {
        let level: usize = field(&row, 0, path)?;
        let record = DistanceRecord {
            reference: field(&row, 1, path)?,
            distance: field(&row, 2, path)?,
            parent: field(&row, 3, path)?,
            next_hop: field(&row, 4, path)?,
        };
        let table = records.get_mut(level).ok_or_else(|| {
            OracleError::InvalidState(format!("witness level {} exceeds k={}", level, k))
        })?;
        table.insert(record.reference, record);
    }
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(level, table)| WitnessTable::from_records(level, table))
        .collect())
}

pub fn write_bunches(path: impl AsRef<Path>, bunches: &Bunches) -> Result<()> {
    write_serializable(path, &[bunches as &dyn Serializable])
}

/// Loads bunches; each entry's parent is its landmark.
pub fn load_bunches(path: impl AsRef<Path>) -> Result<Bunches> {
    let path = path.as_ref();
    let mut bunches = Bunches::new();
    for row in read_rows(path)? {
        let owner: Asn = field(&row, 0, path)?;
        let landmark: Asn = field(&row, 1, path)?;
        bunches.insert(DistanceRecord {
            reference: owner,
            distance: field(&row, 2, path)?,
            parent: landmark,
            next_hop: field(&row, 3, path)?,
        });
    }
    Ok(bunches)
}

/// Sequence of links to delete, one `a, b` pair per row.
pub fn load_edge_deletions(path: impl AsRef<Path>) -> Result<Vec<(Asn, Asn)>> {
    let path = path.as_ref();
    read_rows(path)?
        .iter()
        .map(|row| -> Result<(Asn, Asn)> { Ok((field(row, 0, path)?, field(row, 1, path)?)) })
        .collect()
}

/// Node ranking: the first column of each row, best ranked first.
pub fn load_ranking(path: impl AsRef<Path>) -> Result<NodeRanking> {
    let path = path.as_ref();
    let order = read_rows(path)?
        .iter()
        .map(|row| field(row, 0, path))
        .collect::<Result<Vec<Asn>>>()?;
    Ok(NodeRanking::new(order))
}

/// Locations of the four files describing a preprocessed oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleFiles {
    pub topology: PathBuf,
    pub landmarks: PathBuf,
    pub witnesses: PathBuf,
    pub bunches: PathBuf,
}

impl OracleFiles {
    /// `<dir>/<name>.csv` plus `<dir>/<name>-{landmarks,witnesses,bunches}-<code>.csv`.
    pub fn for_dataset(dir: impl AsRef<Path>, name: &str, strategy_code: u8) -> Self {
        let dir = dir.as_ref();
        Self {
            topology: dir.join(format!("{}.csv", name)),
            landmarks: dir.join(format!("{}-landmarks-{}.csv", name, strategy_code)),
            witnesses: dir.join(format!("{}-witnesses-{}.csv", name, strategy_code)),
            bunches: dir.join(format!("{}-bunches-{}.csv", name, strategy_code)),
        }
    }

    /// Writes landmarks, witnesses and bunches (the topology file is input).
    pub fn save(&self, oracle: &TZOracle) -> Result<()> {
        if !oracle.is_preprocessed() {
            return Err(OracleError::NotPreprocessed);
        }
        write_landmarks(&self.landmarks, oracle.hierarchy())?;
        write_witnesses(&self.witnesses, oracle.witnesses())?;
        write_bunches(&self.bunches, oracle.bunches())?;
        tracing::info!(
            landmarks = %self.landmarks.display(),
            witnesses = %self.witnesses.display(),
            bunches = %self.bunches.display(),
            "Oracle state saved"
        );
        Ok(())
    }

    /// Rebuilds a preprocessed oracle without re-running preprocessing.
    pub fn restore(&self, config: TZConfig) -> Result<TZOracle> {
        let topology = load_topology(&self.topology)?;
        let hierarchy = load_landmarks(&self.landmarks, &topology, config.k)?;
        let witnesses = load_witnesses(&self.witnesses, config.k)?;
        let bunches = load_bunches(&self.bunches)?;
        TZOracle::restore(topology, config, hierarchy, witnesses, bunches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn diamond() -> Topology {
        let mut t = Topology::new();
        t.add_edge(2, 1, Relationship::Provider);
        t.add_edge(3, 1, Relationship::Provider);
        t.add_edge(2, 3, Relationship::Peer);
        t.add_edge(4, 2, Relationship::Provider);
        t.add_edge(4, 3, Relationship::Provider);
        t
    }

    #[test]
    fn test_topology_rows_grouped_by_node() {
        let rows = diamond().rows();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0], vec!["1", "2", "-1"]);
        let firsts: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        let mut sorted = firsts.clone();
        sorted.sort();
        assert_eq!(firsts, sorted);
    }

    #[test]
    fn test_topology_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diamond.csv");
        write_topology(&path, &diamond()).unwrap();
        assert_eq!(load_topology(&path).unwrap(), diamond());
    }

    #[test]
    fn test_non_contiguous_rows_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "1,2,0\n2,1,0\n1,3,0\n3,1,0").unwrap();
        assert!(matches!(load_topology(&path), Err(OracleError::InvalidTopology(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_topology(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, OracleError::Csv(_) | OracleError::Io(_)));
    }

    #[test]
    fn test_edge_deletions_and_ranking() {
        let dir = TempDir::new().unwrap();
        let deletions = dir.path().join("deletions.csv");
        std::fs::write(&deletions, "1,2\n3,4\n").unwrap();
        assert_eq!(load_edge_deletions(&deletions).unwrap(), vec![(1, 2), (3, 4)]);

        let ranking = dir.path().join("ranking.csv");
        std::fs::write(&ranking, "174,1\n3356,2\n").unwrap();
        let ranking = load_ranking(&ranking).unwrap();
        assert_eq!(ranking.positions()[&3356], 1);
    }

    #[test]
    fn test_dataset_file_names() {
        let files = OracleFiles::for_dataset("/data", "edges", 2);
        assert_eq!(files.topology, PathBuf::from("/data/edges.csv"));
        assert_eq!(files.landmarks, PathBuf::from("/data/edges-landmarks-2.csv"));
        assert_eq!(files.witnesses, PathBuf::from("/data/edges-witnesses-2.csv"));
        assert_eq!(files.bunches, PathBuf::from("/data/edges-bunches-2.csv"));
    }
}
