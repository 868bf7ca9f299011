//! # qBittorrent
//!
//! Everything the operator needs to talk to a qBittorrent WebUI:
//!
//! - [`QBittorrentApi`] - an authenticated session (one logged-in client)
//! - [`Connector`] - logs in and hands out sessions
//! - [`ClientPool`] - caches sessions per `(url, username, password)`
//! - credential helpers and magnet URI parsing

mod client;
pub mod credentials;
mod error;
mod pool;
mod utils;

pub use client::{HttpConnector, QBittorrentClient};
pub use credentials::{generate_password, hash_password, CredentialError, Credentials};
pub use error::{ParseError, QbtError};
pub use pool::{credential_key, ClientPool};
pub use utils::get_torrent_hash;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One torrent as reported by `torrents/info`
///
/// Only the fields mirrored into `Torrent.status` are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentInfo {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub total_size: i64,
    #[serde(default)]
    pub content_path: String,
    #[serde(default)]
    pub added_on: i64,
    #[serde(default)]
    pub time_active: i64,
    #[serde(default)]
    pub amount_left: i64,
}

/// An authenticated qBittorrent session
#[async_trait]
pub trait QBittorrentApi: Send + Sync + std::fmt::Debug {
    /// Look a torrent up by info hash, `None` when the engine does not know it
    async fn torrent_info(&self, hash: &str) -> Result<Option<TorrentInfo>, QbtError>;

    async fn add_torrent(&self, magnet_uri: &str) -> Result<(), QbtError>;

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<(), QbtError>;

    /// Application version; doubles as the liveness probe
    async fn version(&self) -> Result<String, QbtError>;
}

/// Opens authenticated sessions
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    async fn connect(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn QBittorrentApi>, QbtError>;
}
