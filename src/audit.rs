//! Audit logging for oracle state changes
//!
//! Every event that builds, restores or damages routing state is emitted as
//! a structured `tracing` event carrying an `event_type` and an `outcome`
//! field, so the JSON log written by [`init_audit_logging`] can be filtered
//! per event.

use crate::error::Result;
use crate::landmarks::StrategyKind;
use crate::repair::RepairStatus;
use crate::topology::Asn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Oracle event types for audit logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleEvent {
    /// Landmark hierarchy elected
    LandmarkElection,
    /// Witness and bunch tables computed
    Preprocessing,
    /// Tables loaded from persisted files
    StateRestore,
    /// Link deletion and repair
    EdgeDeletion,
    /// Link deletion that split the graph
    Disconnection,
    /// Measurement models reset to a snapshot
    SnapshotRestore,
}

impl fmt::Display for OracleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleEvent::LandmarkElection => write!(f, "LANDMARK_ELECTION"),
            OracleEvent::Preprocessing => write!(f, "PREPROCESSING"),
            OracleEvent::StateRestore => write!(f, "STATE_RESTORE"),
            OracleEvent::EdgeDeletion => write!(f, "EDGE_DELETION"),
            OracleEvent::Disconnection => write!(f, "DISCONNECTION"),
            OracleEvent::SnapshotRestore => write!(f, "SNAPSHOT_RESTORE"),
        }
    }
}

/// Audit event outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    /// Event succeeded
    Success,
    /// Event failed
    Failure,
    /// Event was refused before touching state
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "SUCCESS"),
            AuditOutcome::Failure => write!(f, "FAILURE"),
            AuditOutcome::Denied => write!(f, "DENIED"),
        }
    }
}

impl From<RepairStatus> for AuditOutcome {
    fn from(status: RepairStatus) -> Self {
        match status {
            RepairStatus::Repaired => AuditOutcome::Success,
            RepairStatus::Disconnected => AuditOutcome::Failure,
            RepairStatus::NotPerformed => AuditOutcome::Denied,
        }
    }
}

/// Audit logger for oracle events
pub struct AuditLogger;

impl AuditLogger {
    /// Log a landmark election
    ///
    /// # Arguments
    /// * `strategy` - Selection strategy used
    /// * `k` - Number of landmark levels
    /// * `top_level` - Size of the highest non-empty level
    /// * `outcome` - Whether the election produced a usable hierarchy
    pub fn log_landmark_election(
        strategy: StrategyKind,
        k: usize,
        top_level: usize,
        outcome: AuditOutcome,
    ) {
        match outcome {
            AuditOutcome::Success => {
                info!(
                    event_type = %OracleEvent::LandmarkElection,
                    outcome = %outcome,
                    strategy = %strategy,
                    k = k,
                    top_level = top_level,
                    "Landmarks elected"
                );
            }
            AuditOutcome::Failure | AuditOutcome::Denied => {
                warn!(
                    event_type = %OracleEvent::LandmarkElection,
                    outcome = %outcome,
                    strategy = %strategy,
                    k = k,
                    top_level = top_level,
                    "Landmark election rejected"
                );
            }
        }
    }

    /// Log the end of preprocessing
    ///
    /// # Arguments
    /// * `k` - Number of landmark levels
    /// * `bunch_entries` - Total bunch entries built
    /// * `outcome` - Whether the tables were built
    pub fn log_preprocess(k: usize, bunch_entries: usize, outcome: AuditOutcome) {
        match outcome {
            AuditOutcome::Success => {
                info!(
                    event_type = %OracleEvent::Preprocessing,
                    outcome = %outcome,
                    k = k,
                    bunch_entries = bunch_entries,
                    "Preprocessing complete"
                );
            }
            AuditOutcome::Failure | AuditOutcome::Denied => {
                error!(
                    event_type = %OracleEvent::Preprocessing,
                    outcome = %outcome,
                    k = k,
                    "Preprocessing failed"
                );
            }
        }
    }

    /// Log a restore from persisted tables
    ///
    /// # Arguments
    /// * `nodes` - Nodes in the restored topology
    /// * `outcome` - Whether the restored state passed validation
    /// * `reason` - Optional reason for failure
    pub fn log_state_restore(nodes: usize, outcome: AuditOutcome, reason: Option<&str>) {
        match outcome {
            AuditOutcome::Success => {
                info!(
                    event_type = %OracleEvent::StateRestore,
                    outcome = %outcome,
                    nodes = nodes,
                    "Oracle state restored"
                );
            }
            AuditOutcome::Failure | AuditOutcome::Denied => {
                warn!(
                    event_type = %OracleEvent::StateRestore,
                    outcome = %outcome,
                    nodes = nodes,
                    reason = ?reason,
                    "Oracle state rejected"
                );
            }
        }
    }

    /// Log a link deletion
    pub fn log_edge_deletion(a: Asn, b: Asn, status: RepairStatus, impacted: usize) {
        let outcome = AuditOutcome::from(status);
        match outcome {
            AuditOutcome::Success => {
                info!(
                    event_type = %OracleEvent::EdgeDeletion,
                    outcome = %outcome,
                    a = a,
                    b = b,
                    impacted = impacted,
                    "Link deleted"
                );
            }
            AuditOutcome::Failure | AuditOutcome::Denied => {
                warn!(
                    event_type = %OracleEvent::EdgeDeletion,
                    outcome = %outcome,
                    a = a,
                    b = b,
                    status = %status,
                    impacted = impacted,
                    "Link deletion incomplete"
                );
            }
        }
    }

    /// Log a deletion that split the graph
    ///
    /// # Arguments
    /// * `a`, `b` - Endpoints of the deleted link
    /// * `stranded` - Nodes left without some top-level landmark
    pub fn log_disconnection(a: Asn, b: Asn, stranded: usize) {
        warn!(
            event_type = %OracleEvent::Disconnection,
            outcome = %AuditOutcome::Failure,
            a = a,
            b = b,
            stranded = stranded,
            "Graph split by link deletion"
        );
    }

    /// Log a reset of measurement models to a snapshot
    pub fn log_snapshot_restore(round: usize, attempt: usize) {
        info!(
            event_type = %OracleEvent::SnapshotRestore,
            outcome = %AuditOutcome::Success,
            round = round,
            attempt = attempt,
            "Restarting from snapshot"
        );
    }
}

/// Initialize audit logging with file rotation
///
/// # Arguments
/// * `log_dir` - Directory to store log files
/// * `max_files` - Maximum number of log files to keep
///
/// # Returns
/// The guard of the non-blocking writer; logs stop being written once it
/// is dropped.
pub fn init_audit_logging(log_dir: impl AsRef<Path>, max_files: usize) -> Result<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("tz-oracle-audit")
        .filename_suffix("log")
        .max_log_files(max_files)
        .build(log_dir)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        );

    // keep an already installed subscriber
    let _ = subscriber.try_init();

    Ok(guard)
}

/// Plain console logging for the binaries.
pub fn init_console_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
}
