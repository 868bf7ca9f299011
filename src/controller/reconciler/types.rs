//! # Types
//!
//! Shared reconciler context, stores and errors.

use crate::config::ControllerConfig;
use crate::constants::MAX_ERROR_BACKOFF_SECS;
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::{Torrent, TorrentClientConfiguration, TorrentServer};
use crate::qbittorrent::{ClientPool, ParseError};
use crate::store::{KubeStore, MemoryStore, ObjectStore, StoreError};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("resource has no {0}")]
    MissingMetadata(&'static str),
    #[error("cannot build owner reference for {kind} {name}")]
    OwnerReference { kind: &'static str, name: String },
}

/// Backoff state for a single resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, MAX_ERROR_BACKOFF_SECS),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Every object store a reconciler reads or writes
#[derive(Clone)]
pub struct Stores {
    pub torrents: Arc<dyn ObjectStore<Torrent>>,
    pub configurations: Arc<dyn ObjectStore<TorrentClientConfiguration>>,
    pub servers: Arc<dyn ObjectStore<TorrentServer>>,
    pub secrets: Arc<dyn ObjectStore<Secret>>,
    pub pvcs: Arc<dyn ObjectStore<PersistentVolumeClaim>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub services: Arc<dyn ObjectStore<Service>>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// Stores backed by the Kubernetes API
    #[must_use]
    pub fn kube(client: &Client) -> Self {
        Self {
            torrents: Arc::new(KubeStore::<Torrent>::new(client.clone())),
            configurations: Arc::new(KubeStore::<TorrentClientConfiguration>::new(client.clone())),
            servers: Arc::new(KubeStore::<TorrentServer>::new(client.clone())),
            secrets: Arc::new(KubeStore::<Secret>::new(client.clone())),
            pvcs: Arc::new(KubeStore::<PersistentVolumeClaim>::new(client.clone())),
            deployments: Arc::new(KubeStore::<Deployment>::new(client.clone())),
            services: Arc::new(KubeStore::<Service>::new(client.clone())),
        }
    }
}

/// In-process stores, kept by concrete type so callers can seed and inspect them
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    pub torrents: MemoryStore<Torrent>,
    pub configurations: MemoryStore<TorrentClientConfiguration>,
    pub servers: MemoryStore<TorrentServer>,
    pub secrets: MemoryStore<Secret>,
    pub pvcs: MemoryStore<PersistentVolumeClaim>,
    pub deployments: MemoryStore<Deployment>,
    pub services: MemoryStore<Service>,
}

impl MemoryStores {
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores {
            torrents: Arc::new(self.torrents.clone()),
            configurations: Arc::new(self.configurations.clone()),
            servers: Arc::new(self.servers.clone()),
            secrets: Arc::new(self.secrets.clone()),
            pvcs: Arc::new(self.pvcs.clone()),
            deployments: Arc::new(self.deployments.clone()),
            services: Arc::new(self.services.clone()),
        }
    }
}

/// Context shared by all three controllers
#[derive(Clone)]
pub struct Reconciler {
    pub stores: Stores,
    pub pool: ClientPool,
    pub config: ControllerConfig,
    /// Backoff state per resource, keyed by `kind/namespace/name`
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(stores: Stores, pool: ClientPool, config: ControllerConfig) -> Self {
        Self {
            stores,
            pool,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of a resource after a clean reconcile
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}

/// `kind/namespace/name` key for per-resource bookkeeping
#[must_use]
pub fn resource_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}
