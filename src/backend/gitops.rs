//! Flux GitOps backend
//!
//! Decoded updates become a [`GitOpsPlan`]: namespaces to ensure, source and
//! Kustomization objects to create-or-update, and HelmRelease chart
//! references to merge-patch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{BackendKind, ConvergenceBackend};
use crate::coordinator::UpdateInfo;
use crate::descriptor::{
    DeploymentSpec, DescriptorFormat, PackageSource, PackageSpec, QueryDescriptor,
    decode_query_descriptor, fetch_descriptor, parse_update_config,
};
use crate::kube::{ResourceRef, ResourceStore, StoreError, create_or_update};
use crate::models::{
    CrossNamespaceSourceReference, DEFAULT_INTERVAL, FluxResourceKind, GitRepository,
    GitRepositorySpec, HelmChartTemplate, HelmChartTemplateSpec, HelmRelease, HelmReleaseSpec,
    HelmRepository, HelmRepositorySpec,
};
use crate::readiness::ReadinessWaiter;

/// A Flux object to create or replace wholesale
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource {
    pub kind: FluxResourceKind,
    pub object: Value,
}

impl DesiredResource {
    fn from_typed<T: serde::Serialize>(kind: FluxResourceKind, object: &T) -> Result<Self> {
        let object = serde_json::to_value(object)
            .with_context(|| format!("serializing desired {}", kind))?;
        Ok(Self { kind, object })
    }
}

/// Chart reference to merge into an existing HelmRelease
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasePatch {
    pub namespace: String,
    pub name: String,
    pub chart: HelmChartTemplateSpec,
}

impl ReleasePatch {
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(FluxResourceKind::HelmRelease, &self.namespace, &self.name)
    }

    /// Merge patch touching only `spec.chart.spec`
    ///
    /// A null `version` clears a version left over from a Helm source.
    pub fn merge_patch(&self) -> Value {
        json!({
            "spec": {
                "chart": {
                    "spec": {
                        "chart": self.chart.chart,
                        "sourceRef": {
                            "kind": self.chart.source_ref.kind,
                            "name": self.chart.source_ref.name,
                        },
                        "version": self.chart.version,
                    }
                }
            }
        })
    }

    fn release(&self) -> HelmRelease {
        let mut release = HelmRelease::new(
            &self.name,
            HelmReleaseSpec {
                interval: DEFAULT_INTERVAL.to_string(),
                chart: Some(HelmChartTemplate {
                    spec: self.chart.clone(),
                }),
                ..Default::default()
            },
        );
        release.metadata.namespace = Some(self.namespace.clone());
        release
    }
}

/// Everything one update asks of the cluster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitOpsPlan {
    pub namespaces: BTreeSet<String>,
    pub resources: Vec<DesiredResource>,
    pub releases: Vec<ReleasePatch>,
}

impl GitOpsPlan {
    pub fn from_query(descriptor: &QueryDescriptor) -> Result<Self> {
        Ok(Self {
            namespaces: BTreeSet::from([descriptor.namespace().to_string()]),
            resources: vec![
                DesiredResource::from_typed(
                    FluxResourceKind::GitRepository,
                    &descriptor.git_repository,
                )?,
                DesiredResource::from_typed(
                    FluxResourceKind::Kustomization,
                    &descriptor.kustomization,
                )?,
            ],
            releases: Vec::new(),
        })
    }

    pub fn from_deployment(spec: &DeploymentSpec) -> Result<Self> {
        let mut plan = Self::default();
        for package in &spec.packages {
            plan.add_package(package)?;
        }
        Ok(plan)
    }

    fn add_package(&mut self, package: &PackageSpec) -> Result<()> {
        self.namespaces.insert(package.namespace.clone());

        let (source, kind, version) = match &package.source {
            PackageSource::Git { url, reference } => {
                let mut repository = GitRepository::new(
                    &package.name,
                    GitRepositorySpec {
                        url: url.clone(),
                        reference: Some(reference.clone()),
                        interval: DEFAULT_INTERVAL.to_string(),
                        ..Default::default()
                    },
                );
                repository.metadata.namespace = Some(package.namespace.clone());
                (
                    DesiredResource::from_typed(FluxResourceKind::GitRepository, &repository)?,
                    FluxResourceKind::GitRepository,
                    None,
                )
            }
            PackageSource::Helm { url, version } => {
                let mut repository = HelmRepository::new(
                    &package.name,
                    HelmRepositorySpec {
                        url: url.clone(),
                        interval: DEFAULT_INTERVAL.to_string(),
                        ..Default::default()
                    },
                );
                repository.metadata.namespace = Some(package.namespace.clone());
                (
                    DesiredResource::from_typed(FluxResourceKind::HelmRepository, &repository)?,
                    FluxResourceKind::HelmRepository,
                    Some(version.clone()),
                )
            }
        };

        self.resources.push(source);
        self.releases.push(ReleasePatch {
            namespace: package.namespace.clone(),
            name: package.name.clone(),
            chart: HelmChartTemplateSpec {
                chart: package.chart.clone(),
                version,
                source_ref: CrossNamespaceSourceReference {
                    kind: kind.to_string(),
                    name: package.name.clone(),
                    ..Default::default()
                },
                ..Default::default()
            },
        });
        Ok(())
    }
}

/// Converges Flux custom resources through a [`ResourceStore`]
pub struct GitOpsBackend {
    store: Arc<dyn ResourceStore>,
    waiter: ReadinessWaiter,
    format: DescriptorFormat,
    http: reqwest::Client,
}

impl GitOpsBackend {
    /// `http` is used for structured descriptor downloads and should carry
    /// a request timeout, see [`crate::descriptor::http_client`]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        waiter: ReadinessWaiter,
        format: DescriptorFormat,
        http: reqwest::Client,
    ) -> Self {
        Self {
            store,
            waiter,
            format,
            http,
        }
    }

    async fn ensure_namespace(&self, name: &str) -> Result<(), StoreError> {
        if self.store.get_namespace(name).await?.is_some() {
            return Ok(());
        }
        tracing::info!("Creating namespace {}", name);
        self.store.create_namespace(name).await
    }

    async fn apply_release(&self, patch: &ReleasePatch) -> Result<(), StoreError> {
        let resource = patch.resource();
        if self.store.get(&resource).await?.is_some() {
            tracing::debug!("Patching chart of {}", resource);
            self.store.patch_merge(&resource, &patch.merge_patch()).await?;
        } else {
            tracing::info!("Creating {}", resource);
            let release = serde_json::to_value(patch.release()).map_err(|source| {
                StoreError::Serialization {
                    resource: resource.to_string(),
                    source,
                }
            })?;
            self.store.create(FluxResourceKind::HelmRelease, &release).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConvergenceBackend for GitOpsBackend {
    type Desired = GitOpsPlan;

    fn kind(&self) -> BackendKind {
        BackendKind::GitOps
    }

    async fn decode(&self, update: &UpdateInfo) -> Result<GitOpsPlan> {
        match self.format {
            DescriptorFormat::Query => {
                let descriptor = decode_query_descriptor(&update.url)?;
                GitOpsPlan::from_query(&descriptor)
            }
            DescriptorFormat::Structured => {
                let document = fetch_descriptor(&self.http, update).await?;
                let spec = parse_update_config(&document, &update.version)?;
                GitOpsPlan::from_deployment(&spec)
            }
        }
    }

    async fn apply(&self, plan: &GitOpsPlan) -> Result<Vec<ResourceRef>> {
        for namespace in &plan.namespaces {
            self.ensure_namespace(namespace)
                .await
                .with_context(|| format!("ensuring namespace {}", namespace))?;
        }

        let mut touched = Vec::with_capacity(plan.resources.len() + plan.releases.len());
        for desired in &plan.resources {
            let resource = ResourceRef::from_object(desired.kind, &desired.object)?;
            create_or_update(self.store.as_ref(), desired.kind, desired.object.clone())
                .await
                .with_context(|| format!("creating/updating {}", resource))?;
            touched.push(resource);
        }

        for patch in &plan.releases {
            self.apply_release(patch)
                .await
                .with_context(|| format!("updating chart of {}", patch.resource()))?;
            touched.push(patch.resource());
        }

        tracing::info!("Updated {} Flux resources", touched.len());
        Ok(touched)
    }

    async fn await_ready(&self, resources: &[ResourceRef]) -> Result<()> {
        self.waiter
            .wait(resources)
            .await
            .context("waiting for Flux resources to become ready")
    }

    async fn reassert(&self, plan: &GitOpsPlan) -> Result<()> {
        self.apply(plan).await.map(|_| ())
    }
}
