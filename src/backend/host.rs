//! Host config backend
//!
//! Points a host service at a new version by rewriting the `VERSION` key of
//! the env file its unit reads. Restarting the service is left to the
//! service manager watching the file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::env_file::{EnvFile, EnvFileError, VERSION_KEY};
use super::{BackendKind, ConvergenceBackend};
use crate::coordinator::UpdateInfo;
use crate::kube::ResourceRef;
use crate::version::same_version;

pub struct HostConfigBackend {
    path: PathBuf,
}

/// Write `version` into the env file unless it already holds it.
/// Returns whether the file was rewritten.
fn write_version(path: &Path, version: &str) -> Result<bool, EnvFileError> {
    let mut env = EnvFile::load(path)?;

    if env
        .get(VERSION_KEY)
        .is_some_and(|current| same_version(current, version))
    {
        return Ok(false);
    }

    env.set(VERSION_KEY, version);
    env.save(path)?;
    Ok(true)
}

impl HostConfigBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn converge(&self, version: &str) -> Result<bool> {
        let path = self.path.clone();
        let version = version.to_string();
        let changed = tokio::task::spawn_blocking(move || write_version(&path, &version))
            .await
            .context("env file task panicked")??;
        Ok(changed)
    }
}

#[async_trait]
impl ConvergenceBackend for HostConfigBackend {
    type Desired = String;

    fn kind(&self) -> BackendKind {
        BackendKind::HostConfig
    }

    async fn decode(&self, update: &UpdateInfo) -> Result<String> {
        let version = update.version.trim();
        if version.is_empty() {
            anyhow::bail!("update carries no version");
        }
        Ok(version.to_string())
    }

    async fn apply(&self, version: &String) -> Result<Vec<ResourceRef>> {
        let changed = self
            .converge(version)
            .await
            .with_context(|| format!("updating {}", self.path.display()))?;
        if changed {
            tracing::info!("Updated {} to version {}", self.path.display(), version);
        } else {
            tracing::info!("{} already at version {}", self.path.display(), version);
        }
        Ok(Vec::new())
    }

    async fn reassert(&self, version: &String) -> Result<()> {
        let changed = self
            .converge(version)
            .await
            .with_context(|| format!("re-asserting {}", self.path.display()))?;
        if changed {
            tracing::warn!(
                "{} had drifted, restored version {}",
                self.path.display(),
                version
            );
        }
        Ok(())
    }

    async fn installed_version(&self) -> Result<Option<String>> {
        let path = self.path.clone();
        let env = tokio::task::spawn_blocking(move || EnvFile::load(&path))
            .await
            .context("env file task panicked")??;
        Ok(env
            .get(VERSION_KEY)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string))
    }
}
