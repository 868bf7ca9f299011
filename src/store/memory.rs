//! In-process `ObjectStore` with API-server-like write semantics.
//!
//! - `resourceVersion` is bumped on every write; a stale version is a conflict
//! - `.status` is only written through `replace_status`
//! - an object marked for deletion disappears once its finalizers are gone

use super::{kind_of, object_key, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug)]
struct Inner {
    objects: BTreeMap<(String, String), Value>,
    version: u64,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

pub struct MemoryStore<K> {
    inner: Arc<Mutex<Inner>>,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<K> Clone for MemoryStore<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _kind: std::marker::PhantomData,
        }
    }
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                objects: BTreeMap::new(),
                version: 0,
            })),
            _kind: std::marker::PhantomData,
        }
    }
}

impl<K> std::fmt::Debug for MemoryStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

fn metadata_field<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    value.get("metadata").and_then(|m| m.get(field))
}

fn set_metadata_field(value: &mut Value, field: &str, new: Option<Value>) {
    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        match new {
            Some(v) => {
                meta.insert(field.to_string(), v);
            }
            None => {
                meta.remove(field);
            }
        }
    }
}

fn set_status(value: &mut Value, status: Option<Value>) {
    if let Some(obj) = value.as_object_mut() {
        match status {
            Some(s) if !s.is_null() => {
                obj.insert("status".to_string(), s);
            }
            _ => {
                obj.remove("status");
            }
        }
    }
}

fn has_finalizers(value: &Value) -> bool {
    metadata_field(value, "finalizers")
        .and_then(Value::as_array)
        .is_some_and(|f| !f.is_empty())
}

fn is_terminating(value: &Value) -> bool {
    metadata_field(value, "deletionTimestamp").is_some_and(|v| !v.is_null())
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Default,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(namespace: &str, name: &str) -> StoreError {
        StoreError::NotFound {
            kind: kind_of::<K>(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Fail with `Conflict` when the caller's resourceVersion is stale
    fn check_version(stored: &Value, incoming: &Value, namespace: &str, name: &str) -> Result<(), StoreError> {
        let incoming_rv = metadata_field(incoming, "resourceVersion").and_then(Value::as_str);
        let stored_rv = metadata_field(stored, "resourceVersion").and_then(Value::as_str);
        match (incoming_rv, stored_rv) {
            (Some(theirs), Some(ours)) if theirs != ours => Err(StoreError::Conflict {
                kind: kind_of::<K>(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: format!(
                    "the object has been modified (resourceVersion {theirs} != {ours})"
                ),
            }),
            _ => Ok(()),
        }
    }

    /// Store `value`, or drop it if deletion was requested and nothing blocks it
    fn commit(inner: &mut Inner, key: (String, String), mut value: Value) -> Result<K, StoreError> {
        let rv = inner.next_version();
        set_metadata_field(&mut value, "resourceVersion", Some(Value::String(rv)));
        let obj: K = serde_json::from_value(value.clone())?;
        if is_terminating(&value) && !has_finalizers(&value) {
            inner.objects.remove(&key);
        } else {
            inner.objects.insert(key, value);
        }
        Ok(obj)
    }

    /// Store an object as given, status included
    ///
    /// Used to seed fixtures. Replaces any existing object with the same name.
    pub async fn insert(&self, obj: K) -> Result<K, StoreError> {
        let key = object_key(&obj)?;
        let mut value = serde_json::to_value(&obj)?;
        if metadata_field(&value, "uid").is_none() {
            set_metadata_field(
                &mut value,
                "uid",
                Some(Value::String(uuid::Uuid::new_v4().to_string())),
            );
        }
        let mut inner = self.inner.lock().await;
        Self::commit(&mut inner, key, value)
    }

    /// Request deletion, mirroring the API server
    ///
    /// With finalizers present the object only gets a deletion timestamp.
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = (namespace.to_string(), name.to_string());
        let mut inner = self.inner.lock().await;
        let Some(mut value) = inner.objects.get(&key).cloned() else {
            return Err(Self::not_found(namespace, name));
        };
        if !has_finalizers(&value) {
            inner.objects.remove(&key);
            return Ok(());
        }
        if !is_terminating(&value) {
            set_metadata_field(
                &mut value,
                "deletionTimestamp",
                Some(Value::String(
                    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                )),
            );
            Self::commit(&mut inner, key, value)?;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.objects.is_empty()
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Default,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj)?;
        let mut inner = self.inner.lock().await;
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: kind_of::<K>(),
                namespace: key.0,
                name: key.1,
            });
        }
        let mut value = serde_json::to_value(obj)?;
        set_status(&mut value, None);
        set_metadata_field(&mut value, "deletionTimestamp", None);
        set_metadata_field(
            &mut value,
            "uid",
            Some(Value::String(uuid::Uuid::new_v4().to_string())),
        );
        Self::commit(&mut inner, key, value)
    }

    async fn replace(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj)?;
        let mut inner = self.inner.lock().await;
        let Some(stored) = inner.objects.get(&key).cloned() else {
            return Err(Self::not_found(&key.0, &key.1));
        };
        let mut value = serde_json::to_value(obj)?;
        Self::check_version(&stored, &value, &key.0, &key.1)?;
        set_status(&mut value, stored.get("status").cloned());
        for field in ["uid", "deletionTimestamp"] {
            set_metadata_field(&mut value, field, metadata_field(&stored, field).cloned());
        }
        Self::commit(&mut inner, key, value)
    }

    async fn replace_status(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj)?;
        let mut inner = self.inner.lock().await;
        let Some(mut stored) = inner.objects.get(&key).cloned() else {
            return Err(Self::not_found(&key.0, &key.1));
        };
        let value = serde_json::to_value(obj)?;
        Self::check_version(&stored, &value, &key.0, &key.1)?;
        set_status(&mut stored, value.get("status").cloned());
        Self::commit(&mut inner, key, stored)
    }
}
