//! # Torrent Reconciler
//!
//! ```text
//! Pending --add finalizer--> Active --deletion requested--> Terminating --> gone
//! ```
//!
//! In the steady state the torrent is looked up on qBittorrent by info hash,
//! added when missing, and its remote fields mirrored into `.status`.
//! Client resolution and remote failures become a `Degraded` condition and
//! a fixed requeue; only a malformed magnet URI is returned as an error.
//!
//! Deletion: with a recorded hash the torrent is removed from qBittorrent
//! first. A failed remote delete keeps the finalizer and retries. If no
//! client can be resolved at all the finalizer is dropped anyway and the
//! remote torrent is left behind.

use super::{instrumented, requeue, Reconciler, ReconcilerError};
use crate::constants::{
    TORRENT_ACTIVE_REQUEUE, TORRENT_ADDED_REQUEUE, TORRENT_CLIENT_ERROR_REQUEUE,
    TORRENT_FINALIZER, TORRENT_FINALIZER_REQUEUE, TORRENT_REMOTE_ERROR_REQUEUE,
};
use crate::controller::conditions::{set_available, set_degraded};
use crate::controller::resolver::resolve_client;
use crate::crd::{Torrent, TorrentStatus};
use crate::observability::metrics;
use crate::qbittorrent::{get_torrent_hash, TorrentInfo};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const KIND: &str = "Torrent";

/// `kube_runtime` entry point
///
/// # Errors
///
/// See [`reconcile`].
pub async fn reconcile_torrent(
    torrent: Arc<Torrent>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let ctx = ctx.as_ref();
    instrumented(KIND, torrent.as_ref(), ctx, |namespace, name| async move {
        reconcile(ctx, &namespace, &name).await
    })
    .await
}

/// Reconcile the Torrent `namespace/name`
///
/// # Errors
///
/// [`ReconcilerError::Parse`] when the magnet URI carries no info hash,
/// [`ReconcilerError::Store`] when the Torrent itself cannot be read or
/// written.
pub async fn reconcile(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    let Some(mut torrent) = ctx.stores.torrents.get(namespace, name).await? else {
        debug!("Torrent {}/{} no longer exists", namespace, name);
        return Ok(Action::await_change());
    };

    if torrent.metadata.deletion_timestamp.is_some() {
        return finalize(ctx, torrent, namespace).await;
    }

    if !has_finalizer(&torrent) {
        torrent.finalizers_mut().push(TORRENT_FINALIZER.to_string());
        ctx.stores.torrents.replace(&torrent).await?;
        info!("Added finalizer to Torrent {}/{}", namespace, name);
        return Ok(requeue(TORRENT_FINALIZER_REQUEUE, "finalizer-added"));
    }

    let original = torrent.status.clone().unwrap_or_default();
    let mut status = original.clone();

    let client = match resolve_client(
        ctx,
        namespace,
        torrent.spec.client_config_ref.as_ref(),
        &mut status.client_configuration_name,
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to resolve qBittorrent client for Torrent {}/{}: {}", namespace, name, e);
            set_degraded(&mut status.conditions, "ClientResolutionFailed", &e.to_string());
            write_status(ctx, &torrent, status).await;
            return Ok(requeue(TORRENT_CLIENT_ERROR_REQUEUE, "client-resolution-failed"));
        }
    };

    let hash = get_torrent_hash(&torrent.spec.magnet_uri)?;

    match client.torrent_info(hash).await {
        Err(e) => {
            warn!("Failed to get torrent info for {}: {}", hash, e);
            set_degraded(
                &mut status.conditions,
                "FailedToGetTorrentInfo",
                &format!("Failed to get torrent info: {e}"),
            );
            write_status(ctx, &torrent, status).await;
            Ok(requeue(TORRENT_REMOTE_ERROR_REQUEUE, "torrent-info-failed"))
        }
        Ok(None) => match client.add_torrent(&torrent.spec.magnet_uri).await {
            Err(e) => {
                metrics::increment_torrent_operations("add", false);
                warn!("Failed to add torrent {} to qBittorrent: {}", hash, e);
                set_degraded(
                    &mut status.conditions,
                    "FailedToAddTorrent",
                    &format!("Failed to add torrent: {e}"),
                );
                write_status(ctx, &torrent, status).await;
                Ok(requeue(TORRENT_REMOTE_ERROR_REQUEUE, "torrent-add-failed"))
            }
            Ok(()) => {
                metrics::increment_torrent_operations("add", true);
                info!("Added torrent {} for {}/{}", hash, namespace, name);
                set_available(&mut status.conditions, "TorrentAdded", "Torrent added to qBittorrent");
                write_status(ctx, &torrent, status).await;
                Ok(requeue(TORRENT_ADDED_REQUEUE, "torrent-added"))
            }
        },
        Ok(Some(info)) => {
            mirror_torrent_info(&mut status, &info);
            set_available(
                &mut status.conditions,
                "TorrentActive",
                "Torrent is active on qBittorrent",
            );
            if status != original {
                torrent.status = Some(status);
                ctx.stores.torrents.replace_status(&torrent).await?;
                debug!("Updated status of Torrent {}/{}", namespace, name);
            }
            Ok(requeue(TORRENT_ACTIVE_REQUEUE, "torrent-active"))
        }
    }
}

async fn finalize(
    ctx: &Reconciler,
    mut torrent: Torrent,
    namespace: &str,
) -> Result<Action, ReconcilerError> {
    let name = torrent.name_any();
    if !has_finalizer(&torrent) {
        return Ok(Action::await_change());
    }

    let recorded_hash = torrent
        .status
        .as_ref()
        .and_then(|s| s.hash.clone())
        .filter(|h| !h.is_empty());

    if let Some(hash) = recorded_hash {
        let mut status = torrent.status.clone().unwrap_or_default();
        let mut selected = status.client_configuration_name.clone();
        match resolve_client(
            ctx,
            namespace,
            torrent.spec.client_config_ref.as_ref(),
            &mut selected,
        )
        .await
        {
            Err(e) => {
                error!(
                    "Could not resolve qBittorrent client while deleting Torrent {}/{}, removing finalizer without remote cleanup: {}",
                    namespace, name, e
                );
            }
            Ok(client) => {
                let delete_files = torrent.spec.delete_files_on_removal();
                if let Err(e) = client.delete_torrent(&hash, delete_files).await {
                    metrics::increment_torrent_operations("delete", false);
                    warn!("Failed to delete torrent {} from qBittorrent: {}", hash, e);
                    set_degraded(
                        &mut status.conditions,
                        "FailedToDeleteTorrent",
                        &format!("Failed to delete torrent: {e}"),
                    );
                    write_status(ctx, &torrent, status).await;
                    return Ok(requeue(TORRENT_REMOTE_ERROR_REQUEUE, "torrent-delete-failed"));
                }
                metrics::increment_torrent_operations("delete", true);
                info!(
                    "Deleted torrent {} from qBittorrent (deleteFiles={})",
                    hash, delete_files
                );
            }
        }
    }

    torrent.finalizers_mut().retain(|f| f != TORRENT_FINALIZER);
    ctx.stores.torrents.replace(&torrent).await?;
    info!("Removed finalizer from Torrent {}/{}", namespace, name);
    Ok(Action::await_change())
}

fn has_finalizer(torrent: &Torrent) -> bool {
    torrent.finalizers().iter().any(|f| f == TORRENT_FINALIZER)
}

/// Status writes on degraded paths are best effort; the requeue retries them
async fn write_status(ctx: &Reconciler, torrent: &Torrent, status: TorrentStatus) {
    let mut updated = torrent.clone();
    updated.status = Some(status);
    if let Err(e) = ctx.stores.torrents.replace_status(&updated).await {
        error!(
            "Failed to update status of Torrent {}/{}: {}",
            torrent.namespace().unwrap_or_default(),
            torrent.name_any(),
            e
        );
    }
}

fn mirror_torrent_info(status: &mut TorrentStatus, info: &TorrentInfo) {
    status.hash = Some(info.hash.clone());
    status.name = Some(info.name.clone());
    status.state = Some(info.state.clone());
    status.total_size = Some(info.total_size);
    status.content_path = Some(info.content_path.clone());
    status.added_on = Some(info.added_on);
    status.time_active = Some(info.time_active);
    status.amount_left = Some(info.amount_left);
}

/// Whether a change to configuration `configuration_name` should requeue
/// this Torrent: it names it explicitly, or it has no reference and was
/// last resolved to it
#[must_use]
pub fn references_configuration(torrent: &Torrent, configuration_name: &str) -> bool {
    match &torrent.spec.client_config_ref {
        Some(reference) => reference.name == configuration_name,
        None => torrent
            .status
            .as_ref()
            .and_then(|s| s.client_configuration_name.as_deref())
            == Some(configuration_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{LocalObjectReference, TorrentSpec};

    fn torrent(reference: Option<&str>, recorded: Option<&str>) -> Torrent {
        let mut torrent = Torrent::new(
            "ubuntu",
            TorrentSpec {
                magnet_uri: "magnet:?xt=urn:btih:abcd&dn=ubuntu".to_string(),
                client_config_ref: reference.map(|name| LocalObjectReference {
                    name: name.to_string(),
                }),
                delete_files_on_removal: None,
            },
        );
        torrent.status = recorded.map(|name| TorrentStatus {
            client_configuration_name: Some(name.to_string()),
            ..Default::default()
        });
        torrent
    }

    #[test]
    fn test_explicit_reference_wins() {
        assert!(references_configuration(&torrent(Some("a"), Some("b")), "a"));
        assert!(!references_configuration(&torrent(Some("a"), Some("b")), "b"));
    }

    #[test]
    fn test_discovered_configuration_is_matched() {
        assert!(references_configuration(&torrent(None, Some("home")), "home"));
        assert!(!references_configuration(&torrent(None, Some("home")), "other"));
        assert!(!references_configuration(&torrent(None, None), "home"));
    }

    #[test]
    fn test_mirror_torrent_info() {
        let mut status = TorrentStatus::default();
        mirror_torrent_info(
            &mut status,
            &TorrentInfo {
                hash: "abcd".to_string(),
                name: "ubuntu.iso".to_string(),
                state: "downloading".to_string(),
                total_size: 1024,
                content_path: "/downloads/ubuntu.iso".to_string(),
                added_on: 1_700_000_000,
                time_active: 60,
                amount_left: 512,
            },
        );
        assert_eq!(status.hash.as_deref(), Some("abcd"));
        assert_eq!(status.state.as_deref(), Some("downloading"));
        assert_eq!(status.total_size, Some(1024));
        assert_eq!(status.amount_left, Some(512));
    }
}
