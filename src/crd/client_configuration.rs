//! # TorrentClientConfiguration
//!
//! Connection details for one qBittorrent WebUI endpoint.

use crate::crd::status::{Condition, SecretReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// TorrentClientConfiguration Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: torrent.qbittorrent.io/v1alpha1
/// kind: TorrentClientConfiguration
/// metadata:
///   name: home-qbittorrent
///   namespace: media
/// spec:
///   url: http://qbittorrent.media.svc.cluster.local:8080
///   credentialsSecret:
///     name: qbittorrent-credentials
///   checkInterval: 2m
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, JsonSchema)]
#[kube(
    kind = "TorrentClientConfiguration",
    group = "torrent.qbittorrent.io",
    version = "v1alpha1",
    namespaced,
    status = "TorrentClientConfigurationStatus",
    shortname = "tcc",
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".spec.url"}, {"name":"Connected", "type":"boolean", "jsonPath":".status.connected"}, {"name":"Version", "type":"string", "jsonPath":".status.qbittorrentVersion"}, {"name":"Last Checked", "type":"date", "jsonPath":".status.lastChecked"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TorrentClientConfigurationSpec {
    /// WebUI base URL, e.g. `http://qbittorrent:8080`
    pub url: String,
    /// Secret with `username` and `password` keys
    pub credentials_secret: SecretReference,
    /// How often connectivity is re-checked. Go-style duration (`30s`, `1m30s`).
    /// Invalid values fall back to 60s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TorrentClientConfigurationStatus {
    /// Whether the last connectivity check succeeded
    #[serde(default)]
    pub connected: bool,
    /// Time of the last connectivity check (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
    /// Version reported by the WebUI on the last successful check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qbittorrent_version: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
