//! Container backend
//!
//! Replaces the running container named after the package with one started
//! from the `<package>:<version>` image.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{BackendKind, ConvergenceBackend};
use crate::coordinator::UpdateInfo;
use crate::kube::ResourceRef;

/// Time a container gets to exit before it is killed
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(60);

/// A running container as listed by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// Names as reported by the daemon, e.g. `/app`
    pub names: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("running docker {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("docker {command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// The subset of a container daemon the backend drives
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_running(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), RuntimeError>;

    async fn remove(&self, id: &str) -> Result<(), RuntimeError>;

    /// Create a container from `image`, returning its id
    async fn create(&self, name: &str, image: &str) -> Result<String, RuntimeError>;

    async fn start(&self, id: &str) -> Result<(), RuntimeError>;
}

/// Whether a container belongs to `package`
///
/// Only the first name counts, and its second `/` segment must equal the
/// package name exactly.
pub fn matches_package(container: &ContainerSummary, package: &str) -> bool {
    container
        .names
        .first()
        .and_then(|name| name.split('/').nth(1))
        .is_some_and(|segment| segment == package)
}

/// Image and container name for an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTarget {
    pub name: String,
    pub version: String,
}

impl ContainerTarget {
    pub fn image(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

pub struct ContainerBackend {
    runtime: Arc<dyn ContainerRuntime>,
    grace: Duration,
}

impl ContainerBackend {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            grace: STOP_GRACE_PERIOD,
        }
    }

    async fn replace(&self, container: &ContainerSummary, target: &ContainerTarget) -> Result<()> {
        let id = &container.id;
        let label = container.names.first().map_or(id.as_str(), String::as_str);

        tracing::debug!("Stopping container {}", label);
        self.runtime
            .stop(id, self.grace)
            .await
            .with_context(|| format!("stopping container {}", label))?;

        self.runtime
            .remove(id)
            .await
            .with_context(|| format!("removing container {}", label))?;

        let image = target.image();
        let new_id = self
            .runtime
            .create(&target.name, &image)
            .await
            .with_context(|| format!("creating container {} from {}", target.name, image))?;

        self.runtime
            .start(&new_id)
            .await
            .with_context(|| format!("starting container {}", target.name))?;

        tracing::info!("Container {} now runs {}", target.name, image);
        Ok(())
    }
}

#[async_trait]
impl ConvergenceBackend for ContainerBackend {
    type Desired = ContainerTarget;

    fn kind(&self) -> BackendKind {
        BackendKind::Container
    }

    async fn decode(&self, update: &UpdateInfo) -> Result<ContainerTarget> {
        let name = update.package.name.trim();
        if name.is_empty() {
            anyhow::bail!("update {} names no package", update.version);
        }
        Ok(ContainerTarget {
            name: name.to_string(),
            version: update.version.clone(),
        })
    }

    async fn apply(&self, target: &ContainerTarget) -> Result<Vec<ResourceRef>> {
        let containers = self
            .runtime
            .list_running()
            .await
            .context("listing containers")?;

        let matching: Vec<_> = containers
            .iter()
            .filter(|container| matches_package(container, &target.name))
            .collect();

        if matching.is_empty() {
            tracing::warn!("No running container named {}", target.name);
        }

        for container in matching {
            self.replace(container, target).await?;
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::PackageInfo;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn container(id: &str, name: &str) -> ContainerSummary {
        ContainerSummary {
            id: id.to_string(),
            names: vec![name.to_string()],
        }
    }

    fn target() -> ContainerTarget {
        ContainerTarget {
            name: "foo".to_string(),
            version: "2.0.0".to_string(),
        }
    }

    #[test]
    fn test_matches_exact_segment_only() {
        assert!(matches_package(&container("1", "/foo"), "foo"));
        assert!(!matches_package(&container("2", "/foo-worker"), "foo"));
        assert!(!matches_package(&container("3", "/foobar"), "foo"));
        assert!(!matches_package(&container("4", "foo"), "foo"));
        assert!(!matches_package(
            &ContainerSummary {
                id: "5".to_string(),
                names: vec![],
            },
            "foo"
        ));
    }

    #[tokio::test]
    async fn test_replaces_matching_container_in_order() {
        let mut runtime = MockContainerRuntime::new();
        let mut seq = Sequence::new();

        runtime
            .expect_list_running()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![container("abc", "/foo"), container("def", "/foo-worker")]));
        runtime
            .expect_stop()
            .with(eq("abc"), eq(STOP_GRACE_PERIOD))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        runtime
            .expect_remove()
            .with(eq("abc"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runtime
            .expect_create()
            .with(eq("foo"), eq("foo:2.0.0"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("new".to_string()));
        runtime
            .expect_start()
            .with(eq("new"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let backend = ContainerBackend::new(Arc::new(runtime));
        let touched = backend.apply(&target()).await.unwrap();
        assert!(touched.is_empty());
    }

    #[tokio::test]
    async fn test_no_match_is_not_an_error() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_running()
            .returning(|| Ok(vec![container("def", "/foo-worker")]));
        runtime.expect_stop().never();

        let backend = ContainerBackend::new(Arc::new(runtime));
        backend.apply(&target()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_step_is_named() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_running()
            .returning(|| Ok(vec![container("abc", "/foo")]));
        runtime.expect_stop().returning(|_, _| Ok(()));
        runtime.expect_remove().returning(|_| {
            Err(RuntimeError::Failed {
                command: "rm abc".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "No such container".to_string(),
            })
        });
        runtime.expect_create().never();

        let backend = ContainerBackend::new(Arc::new(runtime));
        let err = backend.apply(&target()).await.unwrap_err();
        assert_eq!(err.to_string(), "removing container /foo");
    }

    #[tokio::test]
    async fn test_decode_uses_package_name_and_version() {
        let backend = ContainerBackend::new(Arc::new(MockContainerRuntime::new()));
        let update = UpdateInfo {
            has_update: true,
            version: "2.0.0".to_string(),
            url: String::new(),
            package: PackageInfo {
                name: "foo".to_string(),
                content: None,
            },
        };
        assert_eq!(backend.decode(&update).await.unwrap(), target());
    }
}
