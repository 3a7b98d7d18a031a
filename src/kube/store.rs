//! Custom resource CRUD capability
//!
//! The reconciliation core never talks to `kube::Api` directly. It reads and
//! writes Flux objects as JSON through [`ResourceStore`], addressed by kind,
//! namespace and name.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::models::FluxResourceKind;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Address of a namespaced Flux object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    pub kind: FluxResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: FluxResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build a reference from an object's `metadata`
    pub fn from_object(kind: FluxResourceKind, obj: &Value) -> Result<Self, StoreError> {
        let metadata = obj.get("metadata");
        let field = |key: &str| {
            metadata
                .and_then(|m| m.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        match (field("namespace"), field("name")) {
            (Some(namespace), Some(name)) => Ok(Self::new(kind, namespace, name)),
            _ => Err(StoreError::InvalidObject { kind }),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{action} {resource}")]
    Request {
        action: &'static str,
        resource: String,
        #[source]
        source: BoxError,
    },

    #[error("{kind} object is missing metadata.name or metadata.namespace")]
    InvalidObject { kind: FluxResourceKind },

    #[error("converting {resource}")]
    Serialization {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn request(
        action: &'static str,
        resource: impl fmt::Display,
        source: impl Into<BoxError>,
    ) -> Self {
        StoreError::Request {
            action,
            resource: resource.to_string(),
            source: source.into(),
        }
    }
}

/// Get/create/replace/patch access to namespaces and Flux objects
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Look up a cluster namespace; `Ok(None)` when it does not exist
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, StoreError>;

    async fn create_namespace(&self, name: &str) -> Result<(), StoreError>;

    /// Fetch an object; `Ok(None)` when it does not exist
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>, StoreError>;

    /// Create an object, name and namespace are taken from its metadata
    async fn create(&self, kind: FluxResourceKind, obj: &Value) -> Result<Value, StoreError>;

    /// Replace an object; `metadata.resourceVersion` must match the stored one
    async fn replace(&self, kind: FluxResourceKind, obj: &Value) -> Result<Value, StoreError>;

    /// Apply a JSON merge patch (RFC 7386) to an existing object
    async fn patch_merge(&self, resource: &ResourceRef, patch: &Value)
        -> Result<Value, StoreError>;
}

/// Create the object if absent, otherwise replace it carrying over the
/// stored resourceVersion so the write does not conflict
pub async fn create_or_update(
    store: &dyn ResourceStore,
    kind: FluxResourceKind,
    mut desired: Value,
) -> Result<Value, StoreError> {
    let resource = ResourceRef::from_object(kind, &desired)?;

    let Some(existing) = store.get(&resource).await? else {
        tracing::debug!("Creating {}", resource);
        return store.create(kind, &desired).await;
    };

    let resource_version = existing
        .get("metadata")
        .and_then(|m| m.get("resourceVersion"))
        .cloned()
        .unwrap_or(Value::Null);

    if let Some(metadata) = desired.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert("resourceVersion".to_string(), resource_version);
    }

    tracing::debug!("Updating {}", resource);
    store.replace(kind, &desired).await
}
