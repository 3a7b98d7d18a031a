//! Instance identity resolution
//!
//! The coordinator tracks version history per instance, so the identifier
//! must be stable across restarts for a given deployment target.

use thiserror::Error;

use crate::kube::{ResourceStore, StoreError};

/// Namespace whose UID identifies a cluster
pub const IDENTITY_NAMESPACE: &str = "kube-system";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("namespace {0} not found, cannot derive cluster identity")]
    NamespaceMissing(&'static str),

    #[error("namespace {0} has no uid")]
    MissingUid(&'static str),

    #[error("looking up cluster identity")]
    Store(#[from] StoreError),
}

/// Resolve the identifier reported to the coordinator
///
/// An explicit id always wins. Dev mode gets a fresh random UUID each start.
/// Otherwise the UID of the `kube-system` namespace is used, which requires
/// a cluster store.
pub async fn resolve_instance_id(
    explicit: Option<&str>,
    dev: bool,
    store: Option<&dyn ResourceStore>,
) -> Result<String, IdentityError> {
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        tracing::debug!("Using configured instance id {}", id);
        return Ok(id.to_string());
    }

    if dev {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!("Dev mode: using random instance id {}", id);
        return Ok(id);
    }

    let Some(store) = store else {
        return Err(IdentityError::NamespaceMissing(IDENTITY_NAMESPACE));
    };

    let namespace = store
        .get_namespace(IDENTITY_NAMESPACE)
        .await?
        .ok_or(IdentityError::NamespaceMissing(IDENTITY_NAMESPACE))?;

    namespace
        .metadata
        .uid
        .filter(|uid| !uid.is_empty())
        .ok_or(IdentityError::MissingUid(IDENTITY_NAMESPACE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::memory::MemoryStore;

    #[tokio::test]
    async fn test_explicit_id_wins() {
        let store = MemoryStore::new().with_namespace(IDENTITY_NAMESPACE, Some("cluster-uid"));
        let id = resolve_instance_id(Some("edge-01"), true, Some(&store))
            .await
            .unwrap();
        assert_eq!(id, "edge-01");
    }

    #[tokio::test]
    async fn test_dev_mode_is_random() {
        let a = resolve_instance_id(None, true, None).await.unwrap();
        let b = resolve_instance_id(None, true, None).await.unwrap();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn test_uses_kube_system_uid() {
        let store = MemoryStore::new().with_namespace(IDENTITY_NAMESPACE, Some("cluster-uid"));
        let id = resolve_instance_id(None, false, Some(&store)).await.unwrap();
        assert_eq!(id, "cluster-uid");
    }

    #[tokio::test]
    async fn test_missing_namespace_is_fatal() {
        let store = MemoryStore::new();
        let err = resolve_instance_id(None, false, Some(&store))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NamespaceMissing(_)));
    }

    #[tokio::test]
    async fn test_missing_uid_is_fatal() {
        let store = MemoryStore::new().with_namespace(IDENTITY_NAMESPACE, None);
        let err = resolve_instance_id(None, false, Some(&store))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::MissingUid(_)));
    }
}
