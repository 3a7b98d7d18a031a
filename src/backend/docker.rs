//! [`ContainerRuntime`] backed by the `docker` CLI

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::container::{ContainerRuntime, ContainerSummary, RuntimeError};

/// Drives the local Docker daemon through the `docker` binary
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `docker <args>` and return its trimmed stdout
    async fn run(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let command = args.join(" ");
        tracing::debug!("{} {}", self.binary, command);

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Parse `docker ps --format '{{.ID}}\t{{.Names}}'` output
///
/// The CLI prints names without the leading `/` the daemon API uses; it is
/// restored so matching sees the same shape either way.
pub fn parse_ps_output(output: &str) -> Vec<ContainerSummary> {
    output
        .lines()
        .filter_map(|line| {
            let (id, names) = line.trim().split_once('\t')?;
            let names = names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| format!("/{}", name.trim_start_matches('/')))
                .collect();
            Some(ContainerSummary {
                id: id.trim().to_string(),
                names,
            })
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_running(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let output = self
            .run(&["ps", "--no-trunc", "--format", "{{.ID}}\t{{.Names}}"])
            .await?;
        Ok(parse_ps_output(&output))
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let seconds = grace.as_secs().to_string();
        self.run(&["stop", "--time", &seconds, id]).await.map(|_| ())
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["rm", id]).await.map(|_| ())
    }

    async fn create(&self, name: &str, image: &str) -> Result<String, RuntimeError> {
        self.run(&["create", "--name", name, image]).await
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["start", id]).await.map(|_| ())
    }
}
