//! Nebraska update agent library
//!
//! Polls a Nebraska (Omaha) update server and converges a deployment target
//! (Flux custom resources, a Docker container or a host env file) to the
//! announced version, reporting progress back to the server.

pub mod backend;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod descriptor;
pub mod identity;
pub mod kube;
pub mod models;
pub mod readiness;
pub mod reconcile;
pub mod version;

// Re-export commonly used types for convenience
pub use backend::{BackendKind, ConvergenceBackend};
pub use coordinator::{Progress, UpdateCoordinator, UpdateInfo};
pub use reconcile::{CycleOutcome, Phase, ReconciliationLoop};
