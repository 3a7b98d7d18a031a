//! Flux model layer
//!
//! Rust types for the Flux custom resources this agent writes.
//!
//! Structure:
//! - `source.rs` - GitRepository and HelmRepository (source-controller)
//! - `kustomize.rs` - Kustomization (kustomize-controller)
//! - `helm.rs` - HelmRelease (helm-controller)
//! - `status.rs` - Shared status block and readiness evaluation
//! - `flux_resource_kind.rs` - Kind enum used to address resources

pub mod flux_resource_kind;
pub mod helm;
pub mod kustomize;
pub mod source;
pub mod status;

pub use flux_resource_kind::FluxResourceKind;
pub use helm::{HelmChartTemplate, HelmChartTemplateSpec, HelmRelease, HelmReleaseSpec};
pub use kustomize::{CrossNamespaceSourceReference, Kustomization, KustomizationSpec};
pub use source::{
    GitRepository, GitRepositoryRef, GitRepositorySpec, HelmRepository, HelmRepositorySpec,
};
pub use status::{Condition, FluxStatus, Readiness, evaluate_readiness};

/// Namespace Flux itself is installed into, and the default target for packages
pub const DEFAULT_NAMESPACE: &str = "flux-system";

/// Reconcile interval applied to sources and releases the agent creates
pub const DEFAULT_INTERVAL: &str = "5m";
