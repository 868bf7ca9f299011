//! # Object Store
//!
//! The seam between reconcilers and the Kubernetes API.
//!
//! Reconcilers read and write objects through [`ObjectStore`] rather than
//! `kube::Api` so the same state machines run against a live cluster
//! ([`KubeStore`]) or fully in process ([`MemoryStore`]).

mod api;
mod memory;

pub use api::KubeStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use kube::Resource;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("object has no {0}")]
    MissingMetadata(&'static str),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Namespaced CRUD over one resource kind
///
/// `create` and `replace` never touch `.status`; `replace_status` writes only
/// `.status`. Writes carrying a `resourceVersion` are optimistic.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Resource + Clone + Send + Sync + 'static,
{
    /// Fetch an object, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// List every object of this kind in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError>;

    async fn create(&self, obj: &K) -> Result<K, StoreError>;

    async fn replace(&self, obj: &K) -> Result<K, StoreError>;

    async fn replace_status(&self, obj: &K) -> Result<K, StoreError>;
}

/// Kind name of a statically typed resource
pub(crate) fn kind_of<K>() -> String
where
    K: Resource,
    K::DynamicType: Default,
{
    K::kind(&K::DynamicType::default()).into_owned()
}

/// `(namespace, name)` of an object about to be written
pub(crate) fn object_key<K: Resource>(obj: &K) -> Result<(String, String), StoreError> {
    let meta = obj.meta();
    let name = meta
        .name
        .clone()
        .ok_or(StoreError::MissingMetadata("metadata.name"))?;
    let namespace = meta
        .namespace
        .clone()
        .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
    Ok((namespace, name))
}
