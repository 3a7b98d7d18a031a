//! kube-rs backed [`ResourceStore`]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::store::{ResourceRef, ResourceStore, StoreError};
use crate::models::{FluxResourceKind, GitRepository, HelmRelease, HelmRepository, Kustomization};

/// Resource store talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

// Binds the typed model for `$kind` to `$type` and evaluates `$body` with it
macro_rules! with_kind {
    ($kind:expr, $type:ident => $body:expr) => {
        match $kind {
            FluxResourceKind::GitRepository => {
                type $type = GitRepository;
                $body
            }
            FluxResourceKind::HelmRepository => {
                type $type = HelmRepository;
                $body
            }
            FluxResourceKind::Kustomization => {
                type $type = Kustomization;
                $body
            }
            FluxResourceKind::HelmRelease => {
                type $type = HelmRelease;
                $body
            }
        }
    };
}

fn to_json<T: Serialize>(resource: &ResourceRef, obj: &T) -> Result<Value, StoreError> {
    serde_json::to_value(obj).map_err(|source| StoreError::Serialization {
        resource: resource.to_string(),
        source,
    })
}

fn from_json<T: DeserializeOwned>(resource: &ResourceRef, obj: &Value) -> Result<T, StoreError> {
    serde_json::from_value(obj.clone()).map_err(|source| StoreError::Serialization {
        resource: resource.to_string(),
        source,
    })
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get_opt(name)
            .await
            .map_err(|e| StoreError::request("getting", format!("namespace {}", name), e))
    }

    async fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.create(&PostParams::default(), &namespace)
            .await
            .map_err(|e| StoreError::request("creating", format!("namespace {}", name), e))?;
        Ok(())
    }

    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>, StoreError> {
        with_kind!(resource.kind, R => {
            let api: Api<R> = Api::namespaced(self.client.clone(), &resource.namespace);
            let found = api
                .get_opt(&resource.name)
                .await
                .map_err(|e| StoreError::request("getting", resource, e))?;
            found.map(|obj| to_json(resource, &obj)).transpose()
        })
    }

    async fn create(&self, kind: FluxResourceKind, obj: &Value) -> Result<Value, StoreError> {
        let resource = ResourceRef::from_object(kind, obj)?;
        with_kind!(kind, R => {
            let typed: R = from_json(&resource, obj)?;
            let api: Api<R> = Api::namespaced(self.client.clone(), &resource.namespace);
            let created = api
                .create(&PostParams::default(), &typed)
                .await
                .map_err(|e| StoreError::request("creating", &resource, e))?;
            to_json(&resource, &created)
        })
    }

    async fn replace(&self, kind: FluxResourceKind, obj: &Value) -> Result<Value, StoreError> {
        let resource = ResourceRef::from_object(kind, obj)?;
        with_kind!(kind, R => {
            let typed: R = from_json(&resource, obj)?;
            let api: Api<R> = Api::namespaced(self.client.clone(), &resource.namespace);
            let replaced = api
                .replace(&resource.name, &PostParams::default(), &typed)
                .await
                .map_err(|e| StoreError::request("updating", &resource, e))?;
            to_json(&resource, &replaced)
        })
    }

    async fn patch_merge(
        &self,
        resource: &ResourceRef,
        patch: &Value,
    ) -> Result<Value, StoreError> {
        with_kind!(resource.kind, R => {
            let api: Api<R> = Api::namespaced(self.client.clone(), &resource.namespace);
            let patched = api
                .patch(&resource.name, &PatchParams::default(), &Patch::Merge(patch))
                .await
                .map_err(|e| StoreError::request("patching", resource, e))?;
            to_json(resource, &patched)
        })
    }
}
