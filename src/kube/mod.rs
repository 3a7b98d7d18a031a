//! Kubernetes client module
//!
//! Handles connection to the Kubernetes API server and exposes the
//! [`ResourceStore`] capability the GitOps backend and the identity resolver
//! are written against.

mod api_store;
#[cfg(test)]
pub mod memory;
mod store;

pub use api_store::KubeStore;
pub use store::{BoxError, ResourceRef, ResourceStore, StoreError, create_or_update};

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;

/// Initialize and return a Kubernetes client
///
/// When `kubeconfig` points at an existing file it is used as-is. Otherwise
/// the default loading strategy applies:
/// 1. In-cluster config (if running in a pod)
/// 2. KUBECONFIG environment variable
/// 3. ~/.kube/config
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let config = match kubeconfig.filter(|path| path.exists()) {
        Some(path) => {
            tracing::debug!("Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("reading kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| format!("loading kubeconfig {}", path.display()))?
        }
        None => Config::infer()
            .await
            .context("inferring kubernetes configuration")?,
    };

    tracing::debug!("Kubernetes API server: {}", config.cluster_url);

    let client = Client::try_from(config).context("building kubernetes client")?;
    Ok(client)
}
