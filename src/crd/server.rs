//! # TorrentServer
//!
//! A qBittorrent instance run by the operator: credentials Secret, config
//! PVC, Deployment, Service and a generated TorrentClientConfiguration.

use crate::constants::{
    DEFAULT_CONFIG_ACCESS_MODE, DEFAULT_CONFIG_STORAGE_SIZE, DEFAULT_REPLICAS,
    DEFAULT_SERVER_IMAGE, DEFAULT_SERVICE_TYPE, DEFAULT_WEBUI_PORT,
};
use crate::crd::status::{Condition, SecretReference};
use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// TorrentServer Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: torrent.qbittorrent.io/v1alpha1
/// kind: TorrentServer
/// metadata:
///   name: qbittorrent
///   namespace: media
/// spec:
///   downloadVolumes:
///     - claimName: media-downloads
///       mountPath: /downloads
///   env:
///     - name: TZ
///       value: Europe/Rome
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "TorrentServer",
    group = "torrent.qbittorrent.io",
    version = "v1alpha1",
    namespaced,
    status = "TorrentServerStatus",
    shortname = "ts",
    printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.readyReplicas"}, {"name":"URL", "type":"string", "jsonPath":".status.url"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TorrentServerSpec {
    /// Container image (default: linuxserver qBittorrent 5.1.4)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Number of pods (default: 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Compute resources for the qBittorrent container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub resources: Option<ResourceRequirements>,
    /// Extra environment for the qBittorrent container (PUID, PGID, TZ, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "preserve_unknown_array")]
    pub env: Vec<EnvVar>,
    /// PVC backing `/config`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_storage: Option<StorageSpec>,
    /// Pre-existing PVCs mounted for downloads. Never owned by the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub download_volumes: Vec<DownloadVolumeSpec>,
    /// Use an existing Secret instead of generating `<name>-credentials`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<SecretReference>,
    /// ClusterIP, NodePort or LoadBalancer (default: ClusterIP)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    /// WebUI port (default: 8080)
    #[serde(default, rename = "webUIPort", skip_serializing_if = "Option::is_none")]
    pub web_ui_port: Option<i32>,
}

impl TorrentServerSpec {
    #[must_use]
    pub fn image(&self) -> &str {
        self.image
            .as_deref()
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_SERVER_IMAGE)
    }

    #[must_use]
    pub fn replicas(&self) -> i32 {
        self.replicas.unwrap_or(DEFAULT_REPLICAS)
    }

    #[must_use]
    pub fn web_ui_port(&self) -> i32 {
        self.web_ui_port
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_WEBUI_PORT)
    }

    #[must_use]
    pub fn service_type(&self) -> &str {
        self.service_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SERVICE_TYPE)
    }
}

/// Storage settings for the config PVC. Only applied when the PVC is created.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    /// Requested size (default: 1Gi)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Access modes (default: ReadWriteOnce)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_modes: Vec<String>,
}

impl StorageSpec {
    #[must_use]
    pub fn size(&self) -> &str {
        self.size
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CONFIG_STORAGE_SIZE)
    }

    #[must_use]
    pub fn access_modes(&self) -> Vec<String> {
        if self.access_modes.is_empty() {
            vec![DEFAULT_CONFIG_ACCESS_MODE.to_string()]
        } else {
            self.access_modes.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadVolumeSpec {
    /// Existing PVC name
    pub claim_name: String,
    /// Mount path inside the qBittorrent container
    pub mount_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TorrentServerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(
        default,
        rename = "configPVCName",
        skip_serializing_if = "Option::is_none"
    )]
    pub config_pvc_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_configuration_name: Option<String>,
    #[serde(default)]
    pub ready_replicas: i32,
    /// In-cluster WebUI URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// Core types are passed through verbatim; the API server validates them.
fn preserve_unknown_object(_gen: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

fn preserve_unknown_array(_gen: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "array",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = TorrentServerSpec::default();
        assert_eq!(spec.image(), DEFAULT_SERVER_IMAGE);
        assert_eq!(spec.replicas(), 1);
        assert_eq!(spec.web_ui_port(), 8080);
        assert_eq!(spec.service_type(), "ClusterIP");
    }

    #[test]
    fn test_spec_deserializes_wire_names() {
        let spec: TorrentServerSpec = serde_json::from_value(serde_json::json!({
            "webUIPort": 9090,
            "serviceType": "NodePort",
            "downloadVolumes": [{"claimName": "media", "mountPath": "/downloads"}],
            "configStorage": {"size": "5Gi"}
        }))
        .unwrap();
        assert_eq!(spec.web_ui_port(), 9090);
        assert_eq!(spec.service_type(), "NodePort");
        assert_eq!(spec.download_volumes[0].claim_name, "media");
        let storage = spec.config_storage.unwrap();
        assert_eq!(storage.size(), "5Gi");
        assert_eq!(storage.access_modes(), vec!["ReadWriteOnce".to_string()]);
    }

    #[test]
    fn test_status_wire_names() {
        let status = TorrentServerStatus {
            config_pvc_name: Some("qbt-config".to_string()),
            ready_replicas: 1,
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["configPVCName"], "qbt-config");
        assert_eq!(value["readyReplicas"], 1);
    }
}
