//! Error type shared by the oracle, the baseline simulator and the harness.

use crate::topology::Asn;
use thiserror::Error;

/// Failures surfaced by the routing oracle and its collaborators.
///
/// `InvariantViolation` marks a defect in oracle state: the instance that
/// produced it must be discarded (or restored from a snapshot), never
/// queried again.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Unknown node: AS{0}")]
    UnknownNode(Asn),

    #[error("Invalid hierarchy depth k={0}, must be >= 1")]
    InvalidDepth(usize),

    #[error("Top landmark level is empty")]
    EmptyTopLevel,

    #[error("Oracle has not been preprocessed")]
    NotPreprocessed,

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid persisted state: {0}")]
    InvalidState(String),

    #[error("Shell error: {0}")]
    Shell(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OracleError {
    /// Build an invariant violation and log it at error level.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(violation = %message, "Oracle invariant violated");
        OracleError::InvariantViolation(message)
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, OracleError::InvariantViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            OracleError::UnknownNode(65000).to_string(),
            "Unknown node: AS65000"
        );
        assert_eq!(
            OracleError::InvalidDepth(0).to_string(),
            "Invalid hierarchy depth k=0, must be >= 1"
        );
    }

    #[test]
    fn test_invariant_helper() {
        let err = OracleError::invariant("edge present at one endpoint only");
        assert!(err.is_invariant_violation());
        assert!(!OracleError::EmptyTopLevel.is_invariant_violation());
    }
}
