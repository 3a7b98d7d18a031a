//! Bounded readiness polling
//!
//! After an update is applied the touched Flux objects are polled until every
//! one of them has observed its latest generation and reports `Ready=True`
//! at the same tick.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::kube::{ResourceRef, ResourceStore, StoreError};
use crate::models::{Readiness, evaluate_readiness};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// A tracked resource that was not ready at the last check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaggingResource {
    pub resource: ResourceRef,
    pub readiness: Readiness,
}

impl fmt::Display for LaggingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.resource, self.readiness)
    }
}

fn join_lagging(lagging: &[LaggingResource]) -> String {
    lagging
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("resources not ready after {timeout:?}: {}", join_lagging(.lagging))]
    Timeout {
        timeout: Duration,
        lagging: Vec<LaggingResource>,
    },

    #[error("{0} no longer exists")]
    Missing(ResourceRef),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Evaluate a set of `(resource, object)` pairs, returning the lagging ones
pub fn lagging_resources<'a, I>(objects: I) -> Vec<LaggingResource>
where
    I: IntoIterator<Item = (&'a ResourceRef, &'a serde_json::Value)>,
{
    objects
        .into_iter()
        .filter_map(|(resource, obj)| {
            let readiness = evaluate_readiness(obj);
            (!readiness.is_ready()).then(|| LaggingResource {
                resource: resource.clone(),
                readiness,
            })
        })
        .collect()
}

/// Polls a [`ResourceStore`] until a resource set converges
#[derive(Clone)]
pub struct ReadinessWaiter {
    store: Arc<dyn ResourceStore>,
    interval: Duration,
    timeout: Duration,
}

impl ReadinessWaiter {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_CHECK_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One check of every tracked resource
    async fn check(&self, resources: &[ResourceRef]) -> Result<Vec<LaggingResource>, ReadinessError> {
        let mut objects = Vec::with_capacity(resources.len());
        for resource in resources {
            let obj = self
                .store
                .get(resource)
                .await?
                .ok_or_else(|| ReadinessError::Missing(resource.clone()))?;
            objects.push((resource, obj));
        }
        Ok(lagging_resources(objects.iter().map(|(r, o)| (*r, o))))
    }

    /// Wait until every resource is ready, checking immediately and then
    /// once per interval until the timeout elapses
    pub async fn wait(&self, resources: &[ResourceRef]) -> Result<(), ReadinessError> {
        if resources.is_empty() {
            return Ok(());
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let lagging = self.check(resources).await?;
            if lagging.is_empty() {
                tracing::info!("All {} resources are ready", resources.len());
                return Ok(());
            }

            for resource in &lagging {
                tracing::debug!("Waiting for {}", resource);
            }

            if Instant::now() + self.interval > deadline {
                return Err(ReadinessError::Timeout {
                    timeout: self.timeout,
                    lagging,
                });
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::memory::MemoryStore;
    use crate::models::FluxResourceKind;
    use serde_json::json;

    fn kustomization(name: &str) -> serde_json::Value {
        json!({
            "apiVersion": "kustomize.toolkit.fluxcd.io/v1",
            "kind": "Kustomization",
            "metadata": {"name": name, "namespace": "apps", "generation": 2},
            "spec": {"sourceRef": {"kind": "GitRepository", "name": name}},
            "status": {
                "observedGeneration": 1,
                "conditions": [{"type": "Ready", "status": "True"}]
            }
        })
    }

    fn setup() -> (Arc<MemoryStore>, ResourceRef, ResourceRef) {
        let store = Arc::new(MemoryStore::new());
        store.insert(FluxResourceKind::Kustomization, kustomization("a"));
        store.insert(FluxResourceKind::Kustomization, kustomization("b"));
        (
            store,
            ResourceRef::new(FluxResourceKind::Kustomization, "apps", "a"),
            ResourceRef::new(FluxResourceKind::Kustomization, "apps", "b"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_all_converge() {
        let (store, a, b) = setup();
        let waiter = ReadinessWaiter::new(store.clone());

        let refs = vec![a.clone(), b.clone()];
        let wait = tokio::spawn(async move { waiter.wait(&refs).await });

        tokio::time::sleep(Duration::from_secs(15)).await;
        store.mark_ready(&a);
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(!wait.is_finished());
        store.mark_ready(&b);

        wait.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_lists_lagging_resources() {
        let (store, a, b) = setup();
        store.mark_ready(&a);
        let waiter = ReadinessWaiter::new(store.clone());

        let err = waiter.wait(&[a, b.clone()]).await.unwrap_err();
        match err {
            ReadinessError::Timeout { timeout, lagging } => {
                assert_eq!(timeout, DEFAULT_TIMEOUT);
                assert_eq!(lagging.len(), 1);
                assert_eq!(lagging[0].resource, b);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_resource_aborts() {
        let (store, a, _) = setup();
        let waiter = ReadinessWaiter::new(store);
        let gone = ResourceRef::new(FluxResourceKind::GitRepository, "apps", "gone");

        let err = waiter.wait(&[a, gone.clone()]).await.unwrap_err();
        assert!(matches!(err, ReadinessError::Missing(r) if r == gone));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_aborts() {
        let (store, a, _) = setup();
        store.fail_on(a.clone());
        let waiter = ReadinessWaiter::new(store);

        let err = waiter.wait(&[a]).await.unwrap_err();
        assert!(matches!(err, ReadinessError::Store(_)));
    }
}
