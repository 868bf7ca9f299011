//! Shared fixtures for reconcile integration tests
//!
//! Reconcilers run against `MemoryStores` and an in-process qBittorrent
//! double, so no cluster or HTTP server is needed.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use qbittorrent_operator::config::ControllerConfig;
use qbittorrent_operator::controller::conditions::{find_condition, set_available};
use qbittorrent_operator::controller::reconciler::{MemoryStores, Reconciler};
use qbittorrent_operator::crd::{
    Condition, LocalObjectReference, SecretReference, Torrent, TorrentClientConfiguration,
    TorrentClientConfigurationSpec, TorrentClientConfigurationStatus, TorrentSpec,
};
use qbittorrent_operator::qbittorrent::{
    get_torrent_hash, ClientPool, Connector, QBittorrentApi, QbtError, TorrentInfo,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "media";
pub const URL: &str = "http://qbittorrent.media.svc:8080";
pub const HASH: &str = "3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0";
pub const MAGNET: &str =
    "magnet:?xt=urn:btih:3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0&dn=ubuntu-24.04.iso";

/// A qBittorrent server that keeps torrents in memory
#[derive(Debug, Default)]
pub struct FakeEngine {
    torrents: Mutex<HashMap<String, TorrentInfo>>,
    pub fail_info: AtomicBool,
    pub fail_add: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_version: AtomicBool,
    /// `(hash, delete_files)` of every successful delete
    pub deletes: Mutex<Vec<(String, bool)>>,
}

impl FakeEngine {
    pub fn insert(&self, info: TorrentInfo) {
        self.torrents
            .lock()
            .unwrap()
            .insert(info.hash.to_lowercase(), info);
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.torrents
            .lock()
            .unwrap()
            .contains_key(&hash.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.torrents.lock().unwrap().len()
    }

    fn rejected(path: &'static str) -> QbtError {
        QbtError::Status { path, status: 500 }
    }
}

#[async_trait]
impl QBittorrentApi for FakeEngine {
    async fn torrent_info(&self, hash: &str) -> Result<Option<TorrentInfo>, QbtError> {
        if self.fail_info.load(Ordering::SeqCst) {
            return Err(Self::rejected("/api/v2/torrents/info"));
        }
        Ok(self
            .torrents
            .lock()
            .unwrap()
            .get(&hash.to_lowercase())
            .cloned())
    }

    async fn add_torrent(&self, magnet_uri: &str) -> Result<(), QbtError> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Self::rejected("/api/v2/torrents/add"));
        }
        let hash = get_torrent_hash(magnet_uri)
            .map_err(|_| Self::rejected("/api/v2/torrents/add"))?
            .to_lowercase();
        self.insert(TorrentInfo {
            hash,
            name: "ubuntu-24.04.iso".to_string(),
            state: "metaDL".to_string(),
            ..TorrentInfo::default()
        });
        Ok(())
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<(), QbtError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::rejected("/api/v2/torrents/delete"));
        }
        self.torrents.lock().unwrap().remove(&hash.to_lowercase());
        self.deletes
            .lock()
            .unwrap()
            .push((hash.to_string(), delete_files));
        Ok(())
    }

    async fn version(&self) -> Result<String, QbtError> {
        if self.fail_version.load(Ordering::SeqCst) {
            return Err(Self::rejected("/api/v2/app/version"));
        }
        Ok("v5.1.4".to_string())
    }
}

/// Hands out the shared [`FakeEngine`], or refuses the login
#[derive(Debug, Default)]
pub struct FakeConnector {
    pub engine: Arc<FakeEngine>,
    pub fail_login: AtomicBool,
    pub logins: AtomicUsize,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        url: &str,
        username: &str,
        _password: &str,
    ) -> Result<Arc<dyn QBittorrentApi>, QbtError> {
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(QbtError::LoginFailed {
                url: url.to_string(),
                username: username.to_string(),
            });
        }
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.engine) as Arc<dyn QBittorrentApi>)
    }
}

/// Stores, fake engine and a reconciler wired together
pub struct Harness {
    pub stores: MemoryStores,
    pub connector: Arc<FakeConnector>,
    pub ctx: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let stores = MemoryStores::default();
        let connector = Arc::new(FakeConnector::default());
        let pool = ClientPool::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Duration::from_secs(300),
        );
        let ctx = Reconciler::new(stores.stores(), pool, config);
        Self {
            stores,
            connector,
            ctx,
        }
    }

    pub fn engine(&self) -> &FakeEngine {
        &self.connector.engine
    }

    pub fn fail(&self, flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self, flag: &AtomicBool) {
        flag.store(false, Ordering::SeqCst);
    }
}

pub fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..ObjectMeta::default()
    }
}

pub fn secret(name: &str, entries: &[(&str, &str)]) -> Secret {
    let data: BTreeMap<String, ByteString> = entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
        .collect();
    Secret {
        metadata: meta(name),
        data: Some(data),
        ..Secret::default()
    }
}

pub fn credentials_secret(name: &str) -> Secret {
    secret(name, &[("username", "admin"), ("password", "adminadmin")])
}

pub fn configuration(name: &str, secret_name: &str) -> TorrentClientConfiguration {
    let mut configuration = TorrentClientConfiguration::new(
        name,
        TorrentClientConfigurationSpec {
            url: URL.to_string(),
            credentials_secret: SecretReference {
                name: secret_name.to_string(),
            },
            check_interval: None,
        },
    );
    configuration.metadata.namespace = Some(NAMESPACE.to_string());
    configuration
}

/// A configuration whose last health check succeeded
pub fn available_configuration(name: &str, secret_name: &str) -> TorrentClientConfiguration {
    let mut configuration = configuration(name, secret_name);
    let mut status = TorrentClientConfigurationStatus {
        connected: true,
        ..TorrentClientConfigurationStatus::default()
    };
    set_available(&mut status.conditions, "Connected", "ok");
    configuration.status = Some(status);
    configuration
}

pub fn torrent(name: &str, magnet: &str, reference: Option<&str>) -> Torrent {
    let mut torrent = Torrent::new(
        name,
        TorrentSpec {
            magnet_uri: magnet.to_string(),
            client_config_ref: reference.map(|r| LocalObjectReference {
                name: r.to_string(),
            }),
            delete_files_on_removal: None,
        },
    );
    torrent.metadata.namespace = Some(NAMESPACE.to_string());
    torrent
}

pub fn condition<'a>(conditions: &'a [Condition], r#type: &str) -> &'a Condition {
    find_condition(conditions, r#type)
        .unwrap_or_else(|| panic!("no {} condition in {:?}", r#type, conditions))
}
