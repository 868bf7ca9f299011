//! # Client Pool
//!
//! Caches authenticated qBittorrent sessions keyed by a hash of
//! `(url, username, password)` so reconcilers do not log in on every pass.
//!
//! Idle sessions are evicted two ways:
//!
//! - every hit and insert arms a timer for `ttl`; when it fires the entry is
//!   dropped only if it has not been used since
//! - [`ClientPool::cleanup`] sweeps every entry idle for at least `ttl`,
//!   driven periodically by [`ClientPool::spawn_sweeper`]
//!
//! A session that the server invalidates is not detected here. Callers that
//! see it fail can [`ClientPool::remove`] it and try again.

use super::{Connector, QBittorrentApi, QbtError};
use crate::observability::metrics;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

struct PoolEntry {
    client: Arc<dyn QBittorrentApi>,
    cred_hash: String,
    last_used: Instant,
}

type Entries = Arc<RwLock<HashMap<String, PoolEntry>>>;

/// Cache key for a set of credentials (lower-hex SHA-256)
#[must_use]
pub fn credential_key(url: &str, username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(username.as_bytes());
    hasher.update(b"|");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct ClientPool {
    entries: Entries,
    ttl: Duration,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("ttl", &self.ttl)
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

impl ClientPool {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            connector,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a cached session or log in and cache a new one
    ///
    /// # Errors
    ///
    /// Propagates the connector's error unchanged. Failed logins are not cached.
    pub async fn get_or_create(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn QBittorrentApi>, QbtError> {
        let key = credential_key(url, username, password);

        let cached = {
            let entries = self.entries.read().await;
            entries
                .get(&key)
                .filter(|entry| entry.cred_hash == key)
                .map(|entry| Arc::clone(&entry.client))
        };

        if let Some(client) = cached {
            if let Some(entry) = self.entries.write().await.get_mut(&key) {
                entry.last_used = Instant::now();
            }
            self.schedule_eviction(key);
            return Ok(client);
        }

        let client = self.connector.connect(url, username, password).await?;
        metrics::increment_qbittorrent_logins();
        debug!("Opened qBittorrent session for {} as {}", url, username);

        let size = {
            let mut entries = self.entries.write().await;
            entries.insert(
                key.clone(),
                PoolEntry {
                    client: Arc::clone(&client),
                    cred_hash: key.clone(),
                    last_used: Instant::now(),
                },
            );
            entries.len()
        };
        metrics::set_client_pool_size(size);
        self.schedule_eviction(key);
        Ok(client)
    }

    /// Arm a one-shot timer that drops `key` if it is still idle after `ttl`
    fn schedule_eviction(&self, key: String) {
        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut entries = entries.write().await;
            let idle = entries
                .get(&key)
                .is_some_and(|entry| entry.last_used.elapsed() >= ttl);
            if idle {
                entries.remove(&key);
                metrics::set_client_pool_size(entries.len());
                debug!("Evicted idle qBittorrent session {}", &key[..12]);
            }
        });
    }

    /// Drop a session unconditionally; no-op if absent
    pub async fn remove(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            metrics::set_client_pool_size(entries.len());
        }
    }

    /// Drop every session idle for at least `ttl`, returning how many went
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_used.elapsed() < self.ttl);
        metrics::set_client_pool_size(entries.len());
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Run [`ClientPool::cleanup`] every `interval` until the runtime stops
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = pool.cleanup().await;
                if evicted > 0 {
                    info!("Client pool sweep evicted {} idle session(s)", evicted);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qbittorrent::TorrentInfo;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(300);

    #[derive(Debug)]
    struct NullSession;

    #[async_trait]
    impl QBittorrentApi for NullSession {
        async fn torrent_info(&self, _hash: &str) -> Result<Option<TorrentInfo>, QbtError> {
            Ok(None)
        }
        async fn add_torrent(&self, _magnet_uri: &str) -> Result<(), QbtError> {
            Ok(())
        }
        async fn delete_torrent(&self, _hash: &str, _delete_files: bool) -> Result<(), QbtError> {
            Ok(())
        }
        async fn version(&self) -> Result<String, QbtError> {
            Ok("v5.1.4".to_string())
        }
    }

    #[derive(Debug, Default)]
    struct CountingConnector {
        logins: AtomicUsize,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(
            &self,
            url: &str,
            username: &str,
            password: &str,
        ) -> Result<Arc<dyn QBittorrentApi>, QbtError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if password == "wrong" {
                return Err(QbtError::LoginFailed {
                    url: url.to_string(),
                    username: username.to_string(),
                });
            }
            Ok(Arc::new(NullSession))
        }
    }

    /// Insert an entry directly so only the sweep can evict it
    async fn insert_without_timer(pool: &ClientPool, key: &str) {
        pool.entries.write().await.insert(
            key.to_string(),
            PoolEntry {
                client: Arc::new(NullSession),
                cred_hash: key.to_string(),
                last_used: Instant::now(),
            },
        );
    }

    fn pool() -> (ClientPool, Arc<CountingConnector>) {
        let connector = Arc::new(CountingConnector::default());
        (ClientPool::new(connector.clone(), TTL), connector)
    }

    #[test]
    fn test_credential_key_is_stable_and_distinct() {
        let a = credential_key("http://qbt:8080", "admin", "pw");
        assert_eq!(a, credential_key("http://qbt:8080", "admin", "pw"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, credential_key("http://qbt:8080", "admin", "pw2"));
        assert_ne!(a, credential_key("http://qbt:8081", "admin", "pw"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_reuses_session_without_login() {
        let (pool, connector) = pool();
        let first = pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();
        let second = pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.logins.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_credentials_get_distinct_entries() {
        let (pool, connector) = pool();
        pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();
        pool.get_or_create("http://qbt", "other", "pw").await.unwrap();
        assert_eq!(pool.len().await, 2);
        assert_eq!(connector.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_login_is_not_cached() {
        let (pool, connector) = pool();
        assert!(pool.get_or_create("http://qbt", "admin", "wrong").await.is_err());
        assert!(pool.get_or_create("http://qbt", "admin", "wrong").await.is_err());
        assert!(pool.is_empty().await);
        assert_eq!(connector.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_evicts_only_idle_entries() {
        let (pool, _) = pool();
        insert_without_timer(&pool, "stale").await;
        tokio::time::advance(TTL / 2).await;
        insert_without_timer(&pool, "fresh").await;
        tokio::time::advance(TTL / 2).await;

        assert_eq!(pool.cleanup().await, 1);
        assert!(!pool.contains("stale").await);
        assert!(pool.contains("fresh").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_evicts_idle_entry() {
        let (pool, _) = pool();
        pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();
        tokio::time::sleep(TTL + Duration::from_secs(1)).await;
        assert!(pool.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_spares_entry_reused_after_arming() {
        let (pool, connector) = pool();
        pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();
        tokio::time::sleep(TTL - Duration::from_secs(10)).await;
        pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();

        // First timer fires here and must find the entry recently used
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(pool.len().await, 1);

        // Second timer fires after a full idle ttl
        tokio::time::sleep(TTL).await;
        assert!(pool.is_empty().await);
        assert_eq!(connector.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_is_unconditional_and_idempotent() {
        let (pool, connector) = pool();
        pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();
        let key = credential_key("http://qbt", "admin", "pw");
        pool.remove(&key).await;
        pool.remove(&key).await;
        assert!(pool.is_empty().await);

        pool.get_or_create("http://qbt", "admin", "pw").await.unwrap();
        assert_eq!(connector.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_cleanup() {
        let (pool, _) = pool();
        let sweeper = pool.spawn_sweeper(Duration::from_secs(60));
        insert_without_timer(&pool, "idle").await;
        tokio::time::sleep(TTL + Duration::from_secs(61)).await;
        assert!(pool.is_empty().await);
        sweeper.abort();
    }
}
