//! In-memory [`ResourceStore`] used by unit tests
//!
//! Mimics the API server behaviour the reconciliation core relies on:
//! resourceVersion bumps and conflict detection on replace, generation bumps
//! on spec changes, and JSON merge patches.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::store::{ResourceRef, ResourceStore, StoreError};
use crate::models::FluxResourceKind;

#[derive(Default)]
struct Inner {
    namespaces: BTreeMap<String, Namespace>,
    objects: BTreeMap<ResourceRef, Value>,
    next_version: u64,
    mutations: Vec<String>,
    failing: BTreeSet<ResourceRef>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    auto_ready: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write immediately reports the new generation as observed and Ready
    pub fn with_auto_ready(mut self) -> Self {
        self.auto_ready = true;
        self
    }

    pub fn with_namespace(self, name: &str, uid: Option<&str>) -> Self {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                uid: uid.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        };
        self.inner
            .lock()
            .unwrap()
            .namespaces
            .insert(name.to_string(), namespace);
        self
    }

    /// Seed an object without recording a mutation
    pub fn insert(&self, kind: FluxResourceKind, mut obj: Value) {
        let resource = ResourceRef::from_object(kind, &obj).unwrap();
        let mut inner = self.inner.lock().unwrap();
        inner.next_version += 1;
        let version = inner.next_version.to_string();
        let metadata = obj["metadata"].as_object_mut().unwrap();
        metadata.insert("resourceVersion".to_string(), json!(version));
        metadata.entry("generation").or_insert(json!(1));
        inner.objects.insert(resource, obj);
    }

    pub fn object(&self, resource: &ResourceRef) -> Option<Value> {
        self.inner.lock().unwrap().objects.get(resource).cloned()
    }

    pub fn namespace_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().namespaces.keys().cloned().collect()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.inner.lock().unwrap().mutations.clone()
    }

    /// Make every subsequent get of `resource` fail
    pub fn fail_on(&self, resource: ResourceRef) {
        self.inner.lock().unwrap().failing.insert(resource);
    }

    /// Report the current generation as observed and Ready=True
    pub fn mark_ready(&self, resource: &ResourceRef) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(obj) = inner.objects.get_mut(resource) {
            converge(obj);
        }
    }

    fn finish_write(&self, inner: &mut Inner, resource: ResourceRef, mut obj: Value) -> Value {
        inner.next_version += 1;
        obj["metadata"]["resourceVersion"] = json!(inner.next_version.to_string());
        if self.auto_ready {
            converge(&mut obj);
        }
        inner.objects.insert(resource, obj.clone());
        obj
    }
}

fn converge(obj: &mut Value) {
    let generation = obj["metadata"]["generation"].clone();
    obj["status"] = json!({
        "observedGeneration": generation,
        "conditions": [{"type": "Ready", "status": "True", "reason": "Succeeded"}]
    });
}

fn generation(obj: &Value) -> i64 {
    obj["metadata"]["generation"].as_i64().unwrap_or(1)
}

/// RFC 7386 JSON merge patch
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Some(patch_map) = patch.as_object() else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    let target_map = target.as_object_mut().unwrap();
    for (key, value) in patch_map {
        if value.is_null() {
            target_map.remove(key);
        } else {
            merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, StoreError> {
        Ok(self.inner.lock().unwrap().namespaces.get(name).cloned())
    }

    async fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.namespaces.contains_key(name) {
            return Err(StoreError::request(
                "creating",
                format!("namespace {}", name),
                "already exists",
            ));
        }
        inner.mutations.push(format!("create namespace {}", name));
        inner.namespaces.insert(
            name.to_string(),
            Namespace {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.failing.contains(resource) {
            return Err(StoreError::request("getting", resource, "connection refused"));
        }
        Ok(inner.objects.get(resource).cloned())
    }

    async fn create(&self, kind: FluxResourceKind, obj: &Value) -> Result<Value, StoreError> {
        let resource = ResourceRef::from_object(kind, obj)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.objects.contains_key(&resource) {
            return Err(StoreError::request("creating", &resource, "already exists"));
        }
        inner.mutations.push(format!("create {}", resource));
        let mut obj = obj.clone();
        obj["metadata"]["generation"] = json!(1);
        Ok(self.finish_write(&mut inner, resource, obj))
    }

    async fn replace(&self, kind: FluxResourceKind, obj: &Value) -> Result<Value, StoreError> {
        let resource = ResourceRef::from_object(kind, obj)?;
        let mut inner = self.inner.lock().unwrap();
        let Some(existing) = inner.objects.get(&resource).cloned() else {
            return Err(StoreError::request("updating", &resource, "not found"));
        };
        if existing["metadata"]["resourceVersion"] != obj["metadata"]["resourceVersion"] {
            return Err(StoreError::request(
                "updating",
                &resource,
                "conflict: the object has been modified",
            ));
        }
        inner.mutations.push(format!("replace {}", resource));
        let mut obj = obj.clone();
        let bump = i64::from(existing.get("spec") != obj.get("spec"));
        obj["metadata"]["generation"] = json!(generation(&existing) + bump);
        match existing.get("status") {
            Some(status) => obj["status"] = status.clone(),
            None => {
                if let Some(map) = obj.as_object_mut() {
                    map.remove("status");
                }
            }
        }
        Ok(self.finish_write(&mut inner, resource, obj))
    }

    async fn patch_merge(
        &self,
        resource: &ResourceRef,
        patch: &Value,
    ) -> Result<Value, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(existing) = inner.objects.get(resource).cloned() else {
            return Err(StoreError::request("patching", resource, "not found"));
        };
        inner.mutations.push(format!("patch {}", resource));
        let mut obj = existing.clone();
        merge_patch(&mut obj, patch);
        let bump = i64::from(existing.get("spec") != obj.get("spec"));
        obj["metadata"]["generation"] = json!(generation(&existing) + bump);
        Ok(self.finish_write(&mut inner, resource.clone(), obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_patch_removes_nulls_and_merges_objects() {
        let mut target = json!({"spec": {"chart": {"spec": {"chart": "a", "version": "1.0.0"}}, "values": {"x": 1}}});
        merge_patch(
            &mut target,
            &json!({"spec": {"chart": {"spec": {"chart": "b", "version": null}}}}),
        );
        assert_eq!(
            target,
            json!({"spec": {"chart": {"spec": {"chart": "b"}}, "values": {"x": 1}}})
        );
    }
}
