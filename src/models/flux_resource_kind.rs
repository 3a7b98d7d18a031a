//! Flux Resource Kind definitions
//!
//! Centralized enum for the Flux CRD kinds the agent creates or patches.
//! API group, version and plural come from the typed models through
//! `kube::Resource`.

use std::fmt;

/// Enumeration of the Flux CRD resource kinds managed by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FluxResourceKind {
    // Source Controller resources
    GitRepository,
    HelmRepository,
    // Kustomize Controller resources
    Kustomization,
    // Helm Controller resources
    HelmRelease,
}

impl FluxResourceKind {
    /// Get the display name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FluxResourceKind::GitRepository => "GitRepository",
            FluxResourceKind::HelmRepository => "HelmRepository",
            FluxResourceKind::Kustomization => "Kustomization",
            FluxResourceKind::HelmRelease => "HelmRelease",
        }
    }
}

impl fmt::Display for FluxResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
