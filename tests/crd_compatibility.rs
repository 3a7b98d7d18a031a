//! CRD compatibility tests
//!
//! These tests ensure the hand-written Flux models keep round-tripping the
//! objects Flux controllers actually serve, including fields the agent does
//! not model.

use nua::models::{
    FluxResourceKind, GitRepository, GitRepositoryRef, HelmRelease, HelmRepository, Kustomization,
};
use serde_json::json;

#[test]
fn test_git_repository_from_cluster() {
    let obj = json!({
        "apiVersion": "source.toolkit.fluxcd.io/v1",
        "kind": "GitRepository",
        "metadata": {"name": "app", "namespace": "flux-system", "generation": 2, "resourceVersion": "812"},
        "spec": {
            "url": "https://github.com/org/app",
            "interval": "5m",
            "ref": {"commit": "9ffef19"},
            "timeout": "60s",
            "ignore": "/*\n!/deploy"
        },
        "status": {
            "observedGeneration": 2,
            "artifact": {"revision": "main@sha1:9ffef19"},
            "conditions": [{"type": "Ready", "status": "True", "reason": "Succeeded"}]
        }
    });

    let repo: GitRepository = serde_json::from_value(obj.clone()).unwrap();
    assert_eq!(repo.spec.reference, Some(GitRepositoryRef::commit("9ffef19")));
    assert_eq!(repo.spec.extra["timeout"], "60s");

    let status = repo.status.as_ref().unwrap();
    assert_eq!(status.observed_generation, Some(2));
    assert_eq!(status.condition("Ready").unwrap().status, "True");
    assert!(status.extra.contains_key("artifact"));

    let back = serde_json::to_value(&repo).unwrap();
    assert_eq!(back["spec"], obj["spec"]);
    assert_eq!(back["status"]["artifact"], obj["status"]["artifact"]);
}

#[test]
fn test_helm_repository_keeps_type() {
    let obj = json!({
        "apiVersion": "source.toolkit.fluxcd.io/v1",
        "kind": "HelmRepository",
        "metadata": {"name": "charts", "namespace": "flux-system"},
        "spec": {"url": "oci://ghcr.io/org/charts", "interval": "1h", "type": "oci"}
    });

    let repo: HelmRepository = serde_json::from_value(obj).unwrap();
    assert_eq!(repo.spec.repository_type.as_deref(), Some("oci"));
    assert!(repo.status.is_none());
}

#[test]
fn test_kustomization_minimal_spec() {
    let obj = json!({
        "apiVersion": "kustomize.toolkit.fluxcd.io/v1",
        "kind": "Kustomization",
        "metadata": {"name": "app", "namespace": "apps"},
        "spec": {
            "interval": "10m",
            "path": "./deploy",
            "prune": true,
            "sourceRef": {"kind": "GitRepository", "name": "app", "namespace": "flux-system"},
            "healthChecks": [{"kind": "Deployment", "name": "app", "namespace": "apps"}]
        }
    });

    let kustomization: Kustomization = serde_json::from_value(obj.clone()).unwrap();
    assert_eq!(kustomization.spec.source_ref.name, "app");
    assert_eq!(
        kustomization.spec.source_ref.namespace.as_deref(),
        Some("flux-system")
    );

    let back = serde_json::to_value(&kustomization).unwrap();
    assert_eq!(back["spec"], obj["spec"]);
}

#[test]
fn test_helm_release_chart_template() {
    let obj = json!({
        "apiVersion": "helm.toolkit.fluxcd.io/v2",
        "kind": "HelmRelease",
        "metadata": {"name": "db", "namespace": "data"},
        "spec": {
            "interval": "10m",
            "chart": {"spec": {
                "chart": "postgresql",
                "version": "12.1.0",
                "sourceRef": {"kind": "HelmRepository", "name": "bitnami"},
                "reconcileStrategy": "ChartVersion"
            }},
            "values": {"auth": {"database": "app"}}
        }
    });

    let release: HelmRelease = serde_json::from_value(obj.clone()).unwrap();
    let chart = &release.spec.chart.as_ref().unwrap().spec;
    assert_eq!(chart.chart, "postgresql");
    assert_eq!(chart.version.as_deref(), Some("12.1.0"));
    assert_eq!(chart.source_ref.kind, "HelmRepository");

    let back = serde_json::to_value(&release).unwrap();
    assert_eq!(back["spec"], obj["spec"]);
}

#[test]
fn test_kinds_match_served_api_versions() {
    use kube::Resource;

    assert_eq!(
        GitRepository::api_version(&()),
        "source.toolkit.fluxcd.io/v1"
    );
    assert_eq!(Kustomization::api_version(&()), "kustomize.toolkit.fluxcd.io/v1");
    assert_eq!(HelmRelease::api_version(&()), "helm.toolkit.fluxcd.io/v2");
    assert_eq!(Kustomization::plural(&()), "kustomizations");
    assert_eq!(HelmRepository::kind(&()), FluxResourceKind::HelmRepository.as_str());
}
