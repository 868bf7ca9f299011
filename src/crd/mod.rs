//! # Custom Resource Definitions
//!
//! CRD types for the qBittorrent operator (`torrent.qbittorrent.io/v1alpha1`):
//!
//! - [`Torrent`] - a magnet link kept registered on a qBittorrent server
//! - [`TorrentClientConfiguration`] - WebUI endpoint plus credentials Secret
//! - [`TorrentServer`] - a qBittorrent Deployment managed by the operator

mod client_configuration;
mod server;
mod status;
mod torrent;

pub use client_configuration::{
    TorrentClientConfiguration, TorrentClientConfigurationSpec, TorrentClientConfigurationStatus,
};
pub use server::{
    DownloadVolumeSpec, StorageSpec, TorrentServer, TorrentServerSpec, TorrentServerStatus,
};
pub use status::{Condition, LocalObjectReference, SecretReference};
pub use torrent::{Torrent, TorrentSpec, TorrentStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_crd_names() {
        assert_eq!(
            Torrent::crd_name(),
            "torrents.torrent.qbittorrent.io"
        );
        assert_eq!(
            TorrentClientConfiguration::crd_name(),
            "torrentclientconfigurations.torrent.qbittorrent.io"
        );
        assert_eq!(
            TorrentServer::crd_name(),
            "torrentservers.torrent.qbittorrent.io"
        );
    }

    #[test]
    fn test_torrent_spec_wire_format() {
        let spec: TorrentSpec = serde_json::from_value(serde_json::json!({
            "magnet_uri": "magnet:?xt=urn:btih:ABCD&dn=x",
            "clientConfigRef": {"name": "home"}
        }))
        .unwrap();
        assert_eq!(spec.magnet_uri, "magnet:?xt=urn:btih:ABCD&dn=x");
        assert_eq!(spec.client_config_ref.unwrap().name, "home");
        assert!(spec.delete_files_on_removal.is_none());
    }

    #[test]
    fn test_delete_files_defaults_to_true() {
        let mut spec = TorrentSpec {
            magnet_uri: String::new(),
            client_config_ref: None,
            delete_files_on_removal: None,
        };
        assert!(spec.delete_files_on_removal());
        spec.delete_files_on_removal = Some(false);
        assert!(!spec.delete_files_on_removal());
    }

    #[test]
    fn test_torrent_status_uses_engine_field_names() {
        let status = TorrentStatus {
            total_size: Some(42),
            client_configuration_name: Some("home".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["total_size"], 42);
        assert_eq!(value["clientConfigurationName"], "home");
        assert!(value.get("hash").is_none());
    }

    #[test]
    fn test_client_configuration_status_wire_names() {
        let status = TorrentClientConfigurationStatus {
            connected: true,
            qbittorrent_version: Some("v5.1.4".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["qbittorrentVersion"], "v5.1.4");
        assert_eq!(value["connected"], true);
    }
}
