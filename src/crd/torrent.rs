//! # Torrent
//!
//! A single magnet link the operator keeps registered on a qBittorrent server.

use crate::crd::status::{Condition, LocalObjectReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Torrent Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: torrent.qbittorrent.io/v1alpha1
/// kind: Torrent
/// metadata:
///   name: ubuntu
///   namespace: media
/// spec:
///   magnet_uri: "magnet:?xt=urn:btih:3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0&dn=ubuntu.iso"
///   clientConfigRef:
///     name: home-qbittorrent
///   deleteFilesOnRemoval: false
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, JsonSchema)]
#[kube(
    kind = "Torrent",
    group = "torrent.qbittorrent.io",
    version = "v1alpha1",
    namespaced,
    status = "TorrentStatus",
    shortname = "tor",
    printcolumn = r#"{"name":"Name", "type":"string", "jsonPath":".status.name"}, {"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Client", "type":"string", "jsonPath":".status.clientConfigurationName"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSpec {
    /// Magnet link; the info hash after `btih:` identifies the torrent
    #[serde(rename = "magnet_uri")]
    pub magnet_uri: String,
    /// Configuration to use. When absent, the only configuration in the
    /// namespace is selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_config_ref: Option<LocalObjectReference>,
    /// Remove downloaded data together with the torrent (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_files_on_removal: Option<bool>,
}

impl TorrentSpec {
    #[must_use]
    pub fn delete_files_on_removal(&self) -> bool {
        self.delete_files_on_removal.unwrap_or(true)
    }
}

/// Observed state of a Torrent, mirrored from qBittorrent
///
/// Field names follow the qBittorrent WebUI API rather than Kubernetes casing.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
pub struct TorrentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// qBittorrent state string (downloading, uploading, pausedDL, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    /// Unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_on: Option<i64>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_active: Option<i64>,
    /// Bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_left: Option<i64>,
    /// Configuration the torrent was last resolved against
    #[serde(
        default,
        rename = "clientConfigurationName",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_configuration_name: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
