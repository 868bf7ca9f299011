//! # qBittorrent Operator
//!
//! Kubernetes operator that manages qBittorrent through three custom
//! resources:
//!
//! - `TorrentServer` - deploys qBittorrent with its PVC, Service and
//!   credentials, and publishes a configuration for it
//! - `TorrentClientConfiguration` - where a WebUI lives and which Secret
//!   holds its login; periodically health-checked
//! - `Torrent` - a magnet link kept registered on a configured server
//!
//! The binary also carries the `config-init` subcommand used as the init
//! container of managed servers.

pub mod config;
pub mod configinit;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod qbittorrent;
pub mod runtime;
pub mod store;

pub use crd::*;
