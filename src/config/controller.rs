//! # Controller Configuration
//!
//! Reconciler settings loaded from environment variables.

use super::env_var_or_default;
use crate::constants::{DEFAULT_CLIENT_POOL_SWEEP_INTERVAL_SECS, DEFAULT_CLIENT_POOL_TTL_SECS};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Operator image used for the `config-init` container of managed
    /// servers. When unset, servers start without it.
    pub operator_image: Option<String>,
    /// Idle time before a pooled qBittorrent session is dropped
    pub client_pool_ttl_secs: u64,
    /// Period of the background pool sweep
    pub client_pool_sweep_interval_secs: u64,
    /// Restrict every controller to one namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            operator_image: None,
            client_pool_ttl_secs: DEFAULT_CLIENT_POOL_TTL_SECS,
            client_pool_sweep_interval_secs: DEFAULT_CLIENT_POOL_SWEEP_INTERVAL_SECS,
            watch_namespace: None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ControllerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            operator_image: non_empty_var("OPERATOR_IMAGE"),
            client_pool_ttl_secs: env_var_or_default(
                "CLIENT_POOL_TTL_SECS",
                DEFAULT_CLIENT_POOL_TTL_SECS,
            ),
            client_pool_sweep_interval_secs: env_var_or_default(
                "CLIENT_POOL_SWEEP_INTERVAL_SECS",
                DEFAULT_CLIENT_POOL_SWEEP_INTERVAL_SECS,
            ),
            watch_namespace: non_empty_var("WATCH_NAMESPACE"),
        }
    }

    #[must_use]
    pub fn client_pool_ttl(&self) -> Duration {
        Duration::from_secs(self.client_pool_ttl_secs.max(1))
    }

    #[must_use]
    pub fn client_pool_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.client_pool_sweep_interval_secs.max(1))
    }
}
