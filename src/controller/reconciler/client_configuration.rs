//! # TorrentClientConfiguration Reconciler
//!
//! Periodically proves that a WebUI endpoint is usable. Steps run in order
//! and the first failure decides the `Degraded` reason:
//!
//! 1. credentials Secret exists (`SecretNotFound`)
//! 2. it carries `username` and `password` (`SecretInvalid`)
//! 3. a session can be opened (`ClientCreationFailed`)
//! 4. `app/version` answers (`HealthCheckFailed`)
//!
//! Success sets `Available`/`Connected`. Every outcome requeues after
//! `checkInterval`.

use super::validation::{parse_duration, validate_url};
use super::{instrumented, now_rfc3339, requeue, Reconciler, ReconcilerError};
use crate::constants::DEFAULT_CHECK_INTERVAL;
use crate::controller::conditions::{set_available, set_degraded};
use crate::controller::resolver::load_credentials;
use crate::crd::TorrentClientConfiguration;
use crate::observability::metrics;
use crate::qbittorrent::CredentialError;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const KIND: &str = "TorrentClientConfiguration";

/// Why a probe failed: condition reason and message
#[derive(Debug, Clone, PartialEq, Eq)]
struct Degradation {
    reason: &'static str,
    message: String,
}

/// `kube_runtime` entry point
///
/// # Errors
///
/// See [`reconcile`].
pub async fn reconcile_client_configuration(
    configuration: Arc<TorrentClientConfiguration>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let ctx = ctx.as_ref();
    instrumented(KIND, configuration.as_ref(), ctx, |namespace, name| async move {
        reconcile(ctx, &namespace, &name).await
    })
    .await
}

/// Reconcile the configuration `namespace/name`
///
/// # Errors
///
/// [`ReconcilerError::Store`] when the configuration cannot be read.
pub async fn reconcile(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    let Some(mut configuration) = ctx.stores.configurations.get(namespace, name).await? else {
        debug!("TorrentClientConfiguration {}/{} no longer exists", namespace, name);
        return Ok(Action::await_change());
    };

    let interval = check_interval(&configuration);
    let mut status = configuration.status.clone().unwrap_or_default();

    match probe(ctx, &configuration, namespace).await {
        Ok(version) => {
            let message = format!(
                "Successfully connected to qBittorrent at {}",
                configuration.spec.url
            );
            debug!("{} (version {})", message, version);
            status.connected = true;
            status.qbittorrent_version = Some(version);
            set_available(&mut status.conditions, "Connected", &message);
        }
        Err(degradation) => {
            warn!(
                "TorrentClientConfiguration {}/{} degraded: {}",
                namespace, name, degradation.message
            );
            status.connected = false;
            set_degraded(&mut status.conditions, degradation.reason, &degradation.message);
        }
    }
    status.last_checked = Some(now_rfc3339());

    let was_connected = configuration
        .status
        .as_ref()
        .is_some_and(|s| s.connected);
    if status.connected && !was_connected {
        info!("TorrentClientConfiguration {}/{} is connected", namespace, name);
    }

    configuration.status = Some(status);
    if let Err(e) = ctx.stores.configurations.replace_status(&configuration).await {
        error!(
            "Failed to update status of TorrentClientConfiguration {}/{}: {}",
            namespace, name, e
        );
    }

    Ok(requeue(interval, "check-interval"))
}

async fn probe(
    ctx: &Reconciler,
    configuration: &TorrentClientConfiguration,
    namespace: &str,
) -> Result<String, Degradation> {
    let url = &configuration.spec.url;
    let secret_name = &configuration.spec.credentials_secret.name;

    let credentials = load_credentials(ctx.stores.secrets.as_ref(), namespace, secret_name)
        .await
        .map_err(|e| match e {
            CredentialError::SecretNotFound { .. } | CredentialError::Lookup { .. } => Degradation {
                reason: "SecretNotFound",
                message: format!("Credentials secret {secret_name:?} not found: {e}"),
            },
            CredentialError::MissingKey { .. } | CredentialError::InvalidEncoding { .. } => {
                Degradation {
                    reason: "SecretInvalid",
                    message: format!(
                        "Credentials secret {secret_name:?} missing 'username' or 'password' key"
                    ),
                }
            }
        })?;

    let client_creation_failed = |reason: String| Degradation {
        reason: "ClientCreationFailed",
        message: format!("Failed to create qBittorrent client for {url}: {reason}"),
    };
    validate_url(url).map_err(client_creation_failed)?;
    let client = ctx
        .pool
        .get_or_create(url, &credentials.username, &credentials.password)
        .await
        .map_err(|e| client_creation_failed(e.to_string()))?;

    client.version().await.map_err(|e| Degradation {
        reason: "HealthCheckFailed",
        message: format!("qBittorrent health check failed at {url}: {e}"),
    })
}

/// `spec.checkInterval`, or the default when absent or unparseable
fn check_interval(configuration: &TorrentClientConfiguration) -> Duration {
    let Some(raw) = configuration.spec.check_interval.as_deref() else {
        return DEFAULT_CHECK_INTERVAL;
    };
    parse_duration(raw).unwrap_or_else(|e| {
        metrics::increment_duration_parsing_errors();
        warn!(
            "Invalid checkInterval on TorrentClientConfiguration {}: {}, using {}s",
            configuration.name_any(),
            e,
            DEFAULT_CHECK_INTERVAL.as_secs()
        );
        DEFAULT_CHECK_INTERVAL
    })
}

/// Whether a change to Secret `secret_name` should requeue this configuration
#[must_use]
pub fn uses_secret(configuration: &TorrentClientConfiguration, secret_name: &str) -> bool {
    configuration.spec.credentials_secret.name == secret_name
}
