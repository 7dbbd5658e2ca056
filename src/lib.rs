//! tz_oracle: Thorup-Zwick compact routing over AS-level topologies
//!
//! Core library for landmark election, witness and bunch preprocessing,
//! approximate path queries, incremental repair after link deletion, and
//! the measurements comparing the oracle against a path-vector baseline.

pub mod audit;
pub mod bgp;
pub mod cluster;
pub mod config;
pub mod dijkstra;
pub mod error;
pub mod frontier;
pub mod harness;
pub mod landmarks;
pub mod measure;
pub mod model;
pub mod oracle;
pub mod path;
pub mod persist;
pub mod recorder;
pub mod repair;
pub mod shell;
pub mod topology;
pub mod witness;

pub use bgp::{BgpGraph, ValleyCheck};
pub use config::SimulationConfig;
pub use error::{OracleError, Result};
pub use landmarks::{LandmarkHierarchy, NodeRanking, SelectionStrategy, StrategyKind};
pub use measure::DistanceProfile;
pub use model::RoutingModel;
pub use oracle::{TZConfig, TZOracle};
pub use repair::{RepairOutcome, RepairStatus};
pub use topology::{Asn, Relationship, Route, Topology};
