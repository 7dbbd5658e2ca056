//! Run configuration for the simulation binary.

use crate::bgp::ValleyCheck;
use crate::error::{OracleError, Result};
use crate::landmarks::{SelectionStrategy, StrategyKind};
use crate::oracle::TZConfig;
use crate::persist::{load_ranking, OracleFiles};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a simulation run needs. Loaded from JSON, then overridden
/// by command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Directory holding the dataset and its derived tables
    pub dataset_dir: PathBuf,
    /// Dataset name; the topology is `<dataset_dir>/<dataset>.csv`
    pub dataset: String,
    pub k: usize,
    pub strategy: StrategyKind,
    /// One ASN per row, most important first
    pub ranking_file: Option<PathBuf>,
    /// Load persisted tables instead of preprocessing
    pub restore: bool,
    /// Persist tables after preprocessing
    pub save: bool,
    pub seed: u64,
    pub stretch_rounds: usize,
    pub stretch_batches: usize,
    pub impact_batches: usize,
    pub deletion_stretch_batches: usize,
    pub deletion_rounds: usize,
    pub deletion_proportion: f64,
    /// Fixed deletion sequence, one `a,b` row per link
    pub deletions_file: Option<PathBuf>,
    pub valley_check: ValleyCheck,
    /// Per-sample CSV logs are written here when set
    pub record_dir: Option<PathBuf>,
    /// JSON audit log directory
    pub log_dir: Option<PathBuf>,
    pub max_log_files: usize,
    /// Run summary (JSON)
    pub output: PathBuf,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("data"),
            dataset: "topology".to_string(),
            k: 3,
            strategy: StrategyKind::Random,
            ranking_file: None,
            restore: false,
            save: true,
            seed: 42,
            stretch_rounds: 4,
            stretch_batches: 500,
            impact_batches: 0,
            deletion_stretch_batches: 0,
            deletion_rounds: 0,
            deletion_proportion: 0.01,
            deletions_file: None,
            valley_check: ValleyCheck::Lax,
            record_dir: None,
            log_dir: None,
            max_log_files: 7,
            output: PathBuf::from("simulation-summary.json"),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Rejects settings no run can satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(OracleError::InvalidDepth(self.k));
        }
        if !(0.0..1.0).contains(&self.deletion_proportion) {
            return Err(OracleError::InvalidState(format!(
                "deletion proportion {} outside [0, 1)",
                self.deletion_proportion
            )));
        }
        if self.strategy.needs_ranking() && self.ranking_file.is_none() {
            return Err(OracleError::InvalidState(format!(
                "strategy {} needs a ranking file",
                self.strategy
            )));
        }
        Ok(())
    }

    pub fn tz_config(&self) -> TZConfig {
        TZConfig {
            k: self.k,
            seed: self.seed,
        }
    }

    pub fn oracle_files(&self) -> OracleFiles {
        OracleFiles::for_dataset(&self.dataset_dir, &self.dataset, self.strategy.code())
    }

    /// Builds the selection strategy, loading the ranking when needed.
    pub fn selection_strategy(&self) -> Result<SelectionStrategy> {
        let ranking = match (&self.ranking_file, self.strategy.needs_ranking()) {
            (Some(path), true) => Some(load_ranking(path)?),
            _ => None,
        };
        SelectionStrategy::from_kind(self.strategy, ranking)
    }

    /// Path of a per-sample log, when recording is enabled.
    pub fn record_path(&self, measurement: &str) -> Option<PathBuf> {
        self.record_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-{}.csv", self.dataset, measurement)))
    }
}
