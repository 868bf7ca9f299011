//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Defaults here can be overridden through environment variables where a
//! matching field exists in [`crate::config`].

use std::time::Duration;

/// Field manager used for server-side status patches
pub const FIELD_MANAGER: &str = "qbittorrent-operator";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Idle time after which a pooled qBittorrent session is dropped
pub const DEFAULT_CLIENT_POOL_TTL_SECS: u64 = 300;

/// How often the background sweeper walks the client pool
pub const DEFAULT_CLIENT_POOL_SWEEP_INTERVAL_SECS: u64 = 60;

/// Upper bound for the per-resource error backoff (seconds)
pub const MAX_ERROR_BACKOFF_SECS: u64 = 300;

/// Keys a credentials Secret must carry
pub const SECRET_USERNAME_KEY: &str = "username";
pub const SECRET_PASSWORD_KEY: &str = "password";

// Condition types

pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_DEGRADED: &str = "Degraded";

// Torrent reconciler

pub const TORRENT_FINALIZER: &str = "torrent.qbittorrent.io/finalizer";

pub const TORRENT_FINALIZER_REQUEUE: Duration = Duration::from_secs(1);
pub const TORRENT_ADDED_REQUEUE: Duration = Duration::from_secs(5);
pub const TORRENT_REMOTE_ERROR_REQUEUE: Duration = Duration::from_secs(10);
pub const TORRENT_CLIENT_ERROR_REQUEUE: Duration = Duration::from_secs(15);
pub const TORRENT_ACTIVE_REQUEUE: Duration = Duration::from_secs(15);

// TorrentClientConfiguration reconciler

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

// TorrentServer reconciler

pub const DEFAULT_SERVER_IMAGE: &str = "lscr.io/linuxserver/qbittorrent:amd64-5.1.4";
pub const DEFAULT_WEBUI_PORT: i32 = 8080;
pub const DEFAULT_REPLICAS: i32 = 1;
pub const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";
pub const DEFAULT_CONFIG_STORAGE_SIZE: &str = "1Gi";
pub const DEFAULT_CONFIG_ACCESS_MODE: &str = "ReadWriteOnce";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const GENERATED_PASSWORD_LENGTH: usize = 16;

pub const SERVER_STEP_ERROR_REQUEUE: Duration = Duration::from_secs(10);
pub const SERVER_RECONCILED_REQUEUE: Duration = Duration::from_secs(30);

/// Label placed on configurations generated for a TorrentServer
pub const MANAGED_BY_SERVER_LABEL: &str = "torrent.qbittorrent.io/managed-by";

/// Mount points used by the config-init container
pub const CONFIG_MOUNT_PATH: &str = "/config";
pub const CREDENTIALS_MOUNT_PATH: &str = "/credentials";

/// Path of the operator binary inside its own image
pub const OPERATOR_BINARY_PATH: &str = "/qbittorrent-operator";
