//! # Client Resolution
//!
//! Finds the `TorrentClientConfiguration` that governs a Torrent, reads its
//! credentials Secret and hands back a pooled qBittorrent session.
//!
//! An explicit `clientConfigRef` is authoritative: if it names nothing the
//! lookup fails, it never falls back to discovery. Without a reference the
//! namespace must contain exactly one configuration.

use crate::constants::CONDITION_AVAILABLE;
use crate::controller::conditions::is_condition_true;
use crate::controller::reconciler::Reconciler;
use crate::crd::{LocalObjectReference, TorrentClientConfiguration};
use crate::qbittorrent::{CredentialError, Credentials, QBittorrentApi, QbtError};
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("referenced TorrentClientConfiguration {name:?} not found")]
    ReferenceNotFound { name: String },

    #[error("no TorrentClientConfiguration found in namespace {namespace}")]
    NoneFound { namespace: String },

    #[error("multiple TorrentClientConfigurations found in namespace {namespace}; set spec.clientConfigRef to select one")]
    Ambiguous { namespace: String },

    #[error("TorrentClientConfiguration {name:?} is not available")]
    NotAvailable { name: String },

    #[error("failed to look up TorrentClientConfiguration: {0}")]
    Lookup(#[from] StoreError),
}

/// Any failure between a Torrent and a usable session
#[derive(Debug, Error)]
pub enum ClientResolutionError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("failed to get qBittorrent client: {0}")]
    Connection(#[from] QbtError),
}

/// Select the configuration for `namespace` and check it is Available
///
/// # Errors
///
/// See [`ResolutionError`].
pub async fn resolve_configuration(
    configurations: &dyn ObjectStore<TorrentClientConfiguration>,
    namespace: &str,
    explicit: Option<&LocalObjectReference>,
) -> Result<TorrentClientConfiguration, ResolutionError> {
    let configuration = match explicit {
        Some(reference) => configurations
            .get(namespace, &reference.name)
            .await?
            .ok_or_else(|| ResolutionError::ReferenceNotFound {
                name: reference.name.clone(),
            })?,
        None => {
            let mut candidates = configurations.list(namespace).await?;
            match candidates.len() {
                0 => {
                    return Err(ResolutionError::NoneFound {
                        namespace: namespace.to_string(),
                    })
                }
                1 => candidates.remove(0),
                _ => {
                    return Err(ResolutionError::Ambiguous {
                        namespace: namespace.to_string(),
                    })
                }
            }
        }
    };

    let available = configuration
        .status
        .as_ref()
        .is_some_and(|s| is_condition_true(&s.conditions, CONDITION_AVAILABLE));
    if !available {
        return Err(ResolutionError::NotAvailable {
            name: configuration.name_any(),
        });
    }

    Ok(configuration)
}

/// Read WebUI credentials from a Secret
///
/// # Errors
///
/// [`CredentialError::SecretNotFound`] when the Secret does not exist,
/// [`CredentialError::MissingKey`] / [`CredentialError::InvalidEncoding`]
/// for bad content, [`CredentialError::Lookup`] when the read itself fails.
pub async fn load_credentials(
    secrets: &dyn ObjectStore<Secret>,
    namespace: &str,
    secret_name: &str,
) -> Result<Credentials, CredentialError> {
    let secret = secrets
        .get(namespace, secret_name)
        .await
        .map_err(|e| CredentialError::Lookup {
            name: secret_name.to_string(),
            message: e.to_string(),
        })?
        .ok_or_else(|| CredentialError::SecretNotFound {
            name: secret_name.to_string(),
        })?;
    Credentials::from_secret(&secret)
}

/// Resolve a Torrent's configuration, credentials and session
///
/// `selected` receives the configuration name as soon as one is chosen, so
/// it is recorded even when a later step fails.
///
/// # Errors
///
/// See [`ClientResolutionError`].
pub async fn resolve_client(
    ctx: &Reconciler,
    namespace: &str,
    explicit: Option<&LocalObjectReference>,
    selected: &mut Option<String>,
) -> Result<Arc<dyn QBittorrentApi>, ClientResolutionError> {
    let configuration =
        resolve_configuration(ctx.stores.configurations.as_ref(), namespace, explicit).await?;
    *selected = Some(configuration.name_any());

    let credentials = load_credentials(
        ctx.stores.secrets.as_ref(),
        namespace,
        &configuration.spec.credentials_secret.name,
    )
    .await?;

    debug!(
        "Using TorrentClientConfiguration {}/{} at {}",
        namespace,
        configuration.name_any(),
        configuration.spec.url
    );
    let client = ctx
        .pool
        .get_or_create(
            &configuration.spec.url,
            &credentials.username,
            &credentials.password,
        )
        .await?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::conditions::{set_available, set_degraded};
    use crate::crd::{SecretReference, TorrentClientConfigurationSpec, TorrentClientConfigurationStatus};
    use crate::store::MemoryStore;
    use kube::api::ObjectMeta;

    const NS: &str = "media";

    fn configuration(name: &str, available: bool) -> TorrentClientConfiguration {
        let mut conditions = Vec::new();
        if available {
            set_available(&mut conditions, "Connected", "ok");
        } else {
            set_degraded(&mut conditions, "HealthCheckFailed", "down");
        }
        TorrentClientConfiguration {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NS.to_string()),
                ..Default::default()
            },
            spec: TorrentClientConfigurationSpec {
                url: "http://qbt:8080".to_string(),
                credentials_secret: SecretReference {
                    name: "creds".to_string(),
                },
                check_interval: None,
            },
            status: Some(TorrentClientConfigurationStatus {
                connected: available,
                conditions,
                ..Default::default()
            }),
        }
    }

    fn reference(name: &str) -> LocalObjectReference {
        LocalObjectReference {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_zero_configurations_is_an_error() {
        let store = MemoryStore::<TorrentClientConfiguration>::new();
        let err = resolve_configuration(&store, NS, None).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoneFound { .. }));
    }

    #[tokio::test]
    async fn test_single_configuration_is_selected() {
        let store = MemoryStore::new();
        store.insert(configuration("home", true)).await.unwrap();
        let selected = resolve_configuration(&store, NS, None).await.unwrap();
        assert_eq!(selected.name_any(), "home");
    }

    #[tokio::test]
    async fn test_multiple_configurations_is_ambiguous() {
        let store = MemoryStore::new();
        store.insert(configuration("a", true)).await.unwrap();
        store.insert(configuration("b", true)).await.unwrap();
        let err = resolve_configuration(&store, NS, None).await.unwrap_err();
        assert!(err.to_string().contains("multiple"));
    }

    #[tokio::test]
    async fn test_explicit_reference_does_not_fall_back() {
        let store = MemoryStore::new();
        store.insert(configuration("home", true)).await.unwrap();
        let err = resolve_configuration(&store, NS, Some(&reference("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::ReferenceNotFound { ref name } if name == "missing"));
    }

    #[tokio::test]
    async fn test_explicit_reference_selects_among_many() {
        let store = MemoryStore::new();
        store.insert(configuration("a", true)).await.unwrap();
        store.insert(configuration("b", true)).await.unwrap();
        let selected = resolve_configuration(&store, NS, Some(&reference("b")))
            .await
            .unwrap();
        assert_eq!(selected.name_any(), "b");
    }

    #[tokio::test]
    async fn test_unavailable_configuration_is_rejected() {
        let store = MemoryStore::new();
        store.insert(configuration("home", false)).await.unwrap();
        let err = resolve_configuration(&store, NS, Some(&reference("home")))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NotAvailable { .. }));

        let err = resolve_configuration(&store, NS, None).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotAvailable { .. }));
    }

    #[tokio::test]
    async fn test_configuration_without_status_is_not_available() {
        let store = MemoryStore::new();
        let mut config = configuration("home", true);
        config.status = None;
        store.insert(config).await.unwrap();
        assert!(matches!(
            resolve_configuration(&store, NS, None).await,
            Err(ResolutionError::NotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_credentials_missing_secret() {
        let secrets = MemoryStore::<Secret>::new();
        let err = load_credentials(&secrets, NS, "creds").await.unwrap_err();
        assert_eq!(
            err,
            CredentialError::SecretNotFound {
                name: "creds".to_string()
            }
        );
    }
}
