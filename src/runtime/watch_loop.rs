//! # Watch Loop
//!
//! Runs the Torrent, TorrentClientConfiguration and TorrentServer
//! controllers side by side until SIGINT/SIGTERM.
//!
//! Besides its own kind, each controller is woken by:
//!
//! - Torrent: configurations it references (explicitly or as last resolved)
//! - TorrentClientConfiguration: the credentials Secret it names
//! - TorrentServer: the Deployment, Service, PVC and configuration it owns

use crate::controller::reconciler::client_configuration::{
    reconcile_client_configuration, uses_secret,
};
use crate::controller::reconciler::torrent::{reconcile_torrent, references_configuration};
use crate::controller::reconciler::torrent_server::reconcile_torrent_server;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::{Torrent, TorrentClientConfiguration, TorrentServer};
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::runtime::initialization::{scoped_api, InitializationResult};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use kube::{Client, Resource, ResourceExt};
use kube_runtime::controller::{Action, Error as ControllerError};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

type ReconcileResult<K> =
    Result<(ObjectRef<K>, Action), ControllerError<ReconcilerError, watcher::Error>>;

/// Run all controllers until a shutdown signal arrives
pub async fn run_watch_loop(init: InitializationResult) {
    let InitializationResult {
        client,
        reconciler,
        server_state,
        controller_config,
        sweeper,
    } = init;
    let namespace = controller_config.watch_namespace.as_deref();

    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, marking server as not ready");
            shutdown_state.is_ready.store(false, Ordering::Relaxed);
        }
    });

    info!("Starting controllers...");
    tokio::join!(
        run_torrent_controller(&client, namespace, Arc::clone(&reconciler)),
        run_client_configuration_controller(&client, namespace, Arc::clone(&reconciler)),
        run_torrent_server_controller(&client, namespace, reconciler),
    );

    sweeper.abort();
    info!("Controllers stopped gracefully");
}

async fn run_torrent_controller(client: &Client, namespace: Option<&str>, ctx: Arc<Reconciler>) {
    let controller = Controller::new(
        scoped_api::<Torrent>(client, namespace),
        watcher::Config::default().any_semantic(),
    );
    let torrents = controller.store();

    controller
        .watches(
            scoped_api::<TorrentClientConfiguration>(client, namespace),
            watcher::Config::default(),
            move |configuration: TorrentClientConfiguration| {
                let config_namespace = configuration.namespace();
                let config_name = configuration.name_any();
                torrents
                    .state()
                    .into_iter()
                    .filter(|torrent| {
                        torrent.namespace() == config_namespace
                            && references_configuration(torrent, &config_name)
                    })
                    .map(|torrent| ObjectRef::from_obj(torrent.as_ref()))
                    .collect::<Vec<_>>()
            },
        )
        .shutdown_on_signal()
        .run(reconcile_torrent, handle_reconciliation_error::<Torrent>, ctx)
        .for_each(log_result)
        .await;
    info!("Torrent controller stopped");
}

async fn run_client_configuration_controller(
    client: &Client,
    namespace: Option<&str>,
    ctx: Arc<Reconciler>,
) {
    let controller = Controller::new(
        scoped_api::<TorrentClientConfiguration>(client, namespace),
        watcher::Config::default().any_semantic(),
    );
    let configurations = controller.store();

    controller
        .watches(
            scoped_api::<Secret>(client, namespace),
            watcher::Config::default(),
            move |secret: Secret| {
                let secret_namespace = secret.namespace();
                let secret_name = secret.name_any();
                configurations
                    .state()
                    .into_iter()
                    .filter(|configuration| {
                        configuration.namespace() == secret_namespace
                            && uses_secret(configuration, &secret_name)
                    })
                    .map(|configuration| ObjectRef::from_obj(configuration.as_ref()))
                    .collect::<Vec<_>>()
            },
        )
        .shutdown_on_signal()
        .run(
            reconcile_client_configuration,
            handle_reconciliation_error::<TorrentClientConfiguration>,
            ctx,
        )
        .for_each(log_result)
        .await;
    info!("TorrentClientConfiguration controller stopped");
}

async fn run_torrent_server_controller(
    client: &Client,
    namespace: Option<&str>,
    ctx: Arc<Reconciler>,
) {
    Controller::new(
        scoped_api::<TorrentServer>(client, namespace),
        watcher::Config::default().any_semantic(),
    )
    .owns(scoped_api::<Deployment>(client, namespace), watcher::Config::default())
    .owns(scoped_api::<Service>(client, namespace), watcher::Config::default())
    .owns(
        scoped_api::<PersistentVolumeClaim>(client, namespace),
        watcher::Config::default(),
    )
    .owns(
        scoped_api::<TorrentClientConfiguration>(client, namespace),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(
        reconcile_torrent_server,
        handle_reconciliation_error::<TorrentServer>,
        ctx,
    )
    .for_each(log_result)
    .await;
    info!("TorrentServer controller stopped");
}

async fn log_result<K>(result: ReconcileResult<K>)
where
    K: Resource,
    ObjectRef<K>: Display,
{
    match result {
        Ok((object, _)) => debug!("Reconciled {}", object),
        Err(e) => warn!("Controller error: {}", e),
    }
}
