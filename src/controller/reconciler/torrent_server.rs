//! # TorrentServer Reconciler
//!
//! Create-or-update, in dependency order:
//!
//! | step | object                       | failure reason           |
//! |------|------------------------------|--------------------------|
//! | 1    | credentials Secret           | `CredentialsSecretError` |
//! | 2    | config PVC                   | `ConfigPVCError`         |
//! | 3    | Deployment                   | `DeploymentError`        |
//! | 4    | Service                      | `ServiceError`           |
//! | 5    | TorrentClientConfiguration   | `ClientConfigError`      |
//!
//! A failed step marks the server `Degraded` and requeues shortly. Deletion
//! is left to owner-reference garbage collection.

use super::resources::{
    apply_client_configuration_metadata, apply_config_pvc, apply_deployment, apply_service,
    client_configuration_name, client_configuration_spec, config_pvc_name,
    credentials_secret_name, generated_secret, named, owner_reference, service_url,
};
use super::{instrumented, requeue, Reconciler, ReconcilerError};
use crate::constants::{GENERATED_PASSWORD_LENGTH, SERVER_RECONCILED_REQUEUE, SERVER_STEP_ERROR_REQUEUE};
use crate::controller::conditions::{set_available, set_degraded};
use crate::crd::{TorrentClientConfiguration, TorrentServer, TorrentServerStatus};
use crate::qbittorrent::{generate_password, CredentialError, Credentials};
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const KIND: &str = "TorrentServer";

#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// Whether [`create_or_update`] wrote anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Created,
    Updated,
    Unchanged,
}

/// Fetch the object named by `template`; create it from `template` when
/// missing, otherwise mutate and replace it if the mutation changed it.
/// `mutate` receives `true` on the create path.
async fn create_or_update<K, F>(
    store: &dyn ObjectStore<K>,
    template: K,
    mutate: F,
) -> Result<(K, Operation), StoreError>
where
    K: Resource + Clone + Serialize + Send + Sync + 'static,
    F: FnOnce(&mut K, bool),
{
    let namespace = template
        .meta()
        .namespace
        .clone()
        .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
    let name = template.name_any();

    match store.get(&namespace, &name).await? {
        None => {
            let mut obj = template;
            mutate(&mut obj, true);
            Ok((store.create(&obj).await?, Operation::Created))
        }
        Some(existing) => {
            let mut obj = existing.clone();
            mutate(&mut obj, false);
            if serde_json::to_value(&obj)? == serde_json::to_value(&existing)? {
                return Ok((existing, Operation::Unchanged));
            }
            Ok((store.replace(&obj).await?, Operation::Updated))
        }
    }
}

/// `kube_runtime` entry point
///
/// # Errors
///
/// See [`reconcile`].
pub async fn reconcile_torrent_server(
    server: Arc<TorrentServer>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let ctx = ctx.as_ref();
    instrumented(KIND, server.as_ref(), ctx, |namespace, name| async move {
        reconcile(ctx, &namespace, &name).await
    })
    .await
}

/// Reconcile the TorrentServer `namespace/name`
///
/// # Errors
///
/// [`ReconcilerError::Store`] when the server cannot be read,
/// [`ReconcilerError::OwnerReference`] when it has no uid.
pub async fn reconcile(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    let Some(server) = ctx.stores.servers.get(namespace, name).await? else {
        debug!("TorrentServer {}/{} no longer exists", namespace, name);
        return Ok(Action::await_change());
    };

    if server.metadata.deletion_timestamp.is_some() {
        debug!("TorrentServer {}/{} is being deleted, leaving cleanup to garbage collection", namespace, name);
        return Ok(Action::await_change());
    }

    let owner = owner_reference(&server)?;
    let status = server.status.clone().unwrap_or_default();

    let secret_name = match ensure_credentials_secret(ctx, &server, namespace, &owner).await {
        Ok(secret_name) => secret_name,
        Err(e) => {
            return step_failed(ctx, &server, status, "CredentialsSecretError", "credentials secret", &e).await
        }
    };

    let pvc_name = config_pvc_name(name);
    let pvc = create_or_update(
        ctx.stores.pvcs.as_ref(),
        named::<PersistentVolumeClaim>(&pvc_name, namespace),
        |pvc, is_new| apply_config_pvc(pvc, &server, &owner, is_new),
    )
    .await;
    if let Err(e) = log_operation("PersistentVolumeClaim", namespace, pvc) {
        return step_failed(ctx, &server, status, "ConfigPVCError", "config PVC", &e.into()).await;
    }

    let operator_image = ctx.config.operator_image.as_deref();
    let deployment = create_or_update(
        ctx.stores.deployments.as_ref(),
        named::<Deployment>(name, namespace),
        |deployment, _| apply_deployment(deployment, &server, &owner, &secret_name, operator_image),
    )
    .await;
    let deployment = match log_operation("Deployment", namespace, deployment) {
        Ok(deployment) => deployment,
        Err(e) => {
            return step_failed(ctx, &server, status, "DeploymentError", "deployment", &e.into()).await
        }
    };

    let service = create_or_update(
        ctx.stores.services.as_ref(),
        named::<Service>(name, namespace),
        |service, _| apply_service(service, &server, &owner),
    )
    .await;
    if let Err(e) = log_operation("Service", namespace, service) {
        return step_failed(ctx, &server, status, "ServiceError", "service", &e.into()).await;
    }

    let configuration_name = client_configuration_name(name);
    let configuration_spec = client_configuration_spec(&server, namespace, &secret_name);
    let mut template = TorrentClientConfiguration::new(&configuration_name, configuration_spec.clone());
    template.metadata.namespace = Some(namespace.to_string());
    let configuration = create_or_update(
        ctx.stores.configurations.as_ref(),
        template,
        |configuration, _| {
            apply_client_configuration_metadata(&mut configuration.metadata, &server, &owner);
            configuration.spec = configuration_spec;
        },
    )
    .await;
    if let Err(e) = log_operation("TorrentClientConfiguration", namespace, configuration) {
        return step_failed(ctx, &server, status, "ClientConfigError", "client configuration", &e.into()).await;
    }

    let mut status = status;
    status.deployment_name = Some(name.to_string());
    status.service_name = Some(name.to_string());
    status.config_pvc_name = Some(pvc_name);
    status.client_configuration_name = Some(configuration_name);
    status.url = Some(service_url(name, namespace, server.spec.web_ui_port()));
    status.ready_replicas = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    set_available(&mut status.conditions, "Reconciled", "All resources are reconciled");
    write_status(ctx, &server, status).await;

    Ok(requeue(SERVER_RECONCILED_REQUEUE, "server-reconciled"))
}

/// Use the referenced Secret, or create `<name>-credentials` once
async fn ensure_credentials_secret(
    ctx: &Reconciler,
    server: &TorrentServer,
    namespace: &str,
    owner: &OwnerReference,
) -> Result<String, StepError> {
    let secret_name = credentials_secret_name(server);

    if server.spec.credentials_secret.is_some() {
        let secret = ctx
            .stores
            .secrets
            .get(namespace, &secret_name)
            .await?
            .ok_or_else(|| CredentialError::SecretNotFound {
                name: secret_name.clone(),
            })?;
        Credentials::from_secret(&secret)?;
        return Ok(secret_name);
    }

    if ctx.stores.secrets.get(namespace, &secret_name).await?.is_some() {
        return Ok(secret_name);
    }

    let password = generate_password(GENERATED_PASSWORD_LENGTH);
    let secret = generated_secret(server, namespace, owner, &password);
    match ctx.stores.secrets.create(&secret).await {
        Ok(_) => {
            info!("Generated credentials secret {}/{}", namespace, secret_name);
            Ok(secret_name)
        }
        Err(StoreError::AlreadyExists { .. }) => Ok(secret_name),
        Err(e) => Err(e.into()),
    }
}

fn log_operation<K: Resource>(
    kind: &str,
    namespace: &str,
    result: Result<(K, Operation), StoreError>,
) -> Result<K, StoreError> {
    let (obj, operation) = result?;
    match operation {
        Operation::Created => info!("Created {} {}/{}", kind, namespace, obj.meta().name.as_deref().unwrap_or_default()),
        Operation::Updated => debug!("Updated {} {}/{}", kind, namespace, obj.meta().name.as_deref().unwrap_or_default()),
        Operation::Unchanged => {}
    }
    Ok(obj)
}

async fn step_failed(
    ctx: &Reconciler,
    server: &TorrentServer,
    mut status: TorrentServerStatus,
    reason: &str,
    step: &str,
    error: &StepError,
) -> Result<Action, ReconcilerError> {
    warn!(
        "Failed to reconcile {} for TorrentServer {}/{}: {}",
        step,
        server.namespace().unwrap_or_default(),
        server.name_any(),
        error
    );
    set_degraded(
        &mut status.conditions,
        reason,
        &format!("Failed to reconcile {step}: {error}"),
    );
    write_status(ctx, server, status).await;
    Ok(requeue(SERVER_STEP_ERROR_REQUEUE, "server-step-failed"))
}

async fn write_status(ctx: &Reconciler, server: &TorrentServer, status: TorrentServerStatus) {
    if server.status.as_ref() == Some(&status) {
        return;
    }
    let mut updated = server.clone();
    updated.status = Some(status);
    if let Err(e) = ctx.stores.servers.replace_status(&updated).await {
        error!(
            "Failed to update status of TorrentServer {}/{}: {}",
            server.namespace().unwrap_or_default(),
            server.name_any(),
            e
        );
    }
}
