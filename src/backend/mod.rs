//! Convergence backends
//!
//! A backend turns an announced update into a desired state, applies it to
//! its target and reports when the target has converged. The reconciliation
//! loop is generic over [`ConvergenceBackend`], so the GitOps, container and
//! host variants share one update cycle.

mod container;
mod docker;
mod env_file;
mod gitops;
mod host;

pub use container::{
    ContainerBackend, ContainerRuntime, ContainerSummary, ContainerTarget, RuntimeError,
    STOP_GRACE_PERIOD, matches_package,
};
#[cfg(test)]
pub use container::MockContainerRuntime;
pub use docker::DockerCli;
pub use env_file::{EnvFile, EnvFileError, VERSION_KEY};
pub use gitops::{DesiredResource, GitOpsBackend, GitOpsPlan, ReleasePatch};
pub use host::HostConfigBackend;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coordinator::UpdateInfo;
use crate::kube::ResourceRef;

/// Deployment target selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    /// Flux custom resources in a Kubernetes cluster
    #[default]
    GitOps,
    /// A Docker container named after the package
    Container,
    /// A `KEY=value` env file read by a host service manager
    HostConfig,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::GitOps => f.write_str("gitops"),
            BackendKind::Container => f.write_str("container"),
            BackendKind::HostConfig => f.write_str("host-config"),
        }
    }
}

/// Applies a decoded update to one deployment target
#[async_trait]
pub trait ConvergenceBackend: Send + Sync {
    /// Decoded desired state, kept by the loop for self-healing
    type Desired: Clone + fmt::Debug + Send + Sync;

    fn kind(&self) -> BackendKind;

    /// Turn an announced update into the desired state for this target
    async fn decode(&self, update: &UpdateInfo) -> Result<Self::Desired>;

    /// Converge the target, returning the resources readiness must track
    async fn apply(&self, desired: &Self::Desired) -> Result<Vec<ResourceRef>>;

    /// Block until the touched resources report convergence
    async fn await_ready(&self, _resources: &[ResourceRef]) -> Result<()> {
        Ok(())
    }

    /// Re-apply the last committed state on a no-update poll
    async fn reassert(&self, _desired: &Self::Desired) -> Result<()> {
        Ok(())
    }

    /// Version already deployed on the target, when the target records one
    async fn installed_version(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
