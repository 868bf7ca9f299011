//! # Initialization
//!
//! Process setup before the controllers start: rustls, tracing, metrics,
//! the probe server, the Kubernetes client and the shared client pool.

use crate::config::{load_config, ControllerConfig, ServerConfig};
use crate::controller::reconciler::{Reconciler, Stores};
use crate::controller::server::{start_server, ServerState};
use crate::crd::{Torrent, TorrentClientConfiguration, TorrentServer};
use crate::observability;
use crate::qbittorrent::{ClientPool, HttpConnector};
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
    /// Background pool sweep; aborted on shutdown
    pub sweeper: JoinHandle<()>,
}

impl Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Install the subscriber used by every subcommand
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qbittorrent_operator=info".into()),
        )
        .try_init();
}

/// Initialize the operator runtime
///
/// # Errors
///
/// Fails when metrics cannot be registered, the probe server does not come
/// up, or no Kubernetes client can be built.
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ before any TLS is used
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    init_tracing();

    info!("Starting qBittorrent operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let (controller_config, server_config) = load_config();
    info!(
        "Configuration: metrics_port={}, client_pool_ttl={}s, sweep_interval={}s, watch_namespace={}, operator_image={}",
        server_config.metrics_port,
        controller_config.client_pool_ttl_secs,
        controller_config.client_pool_sweep_interval_secs,
        controller_config.watch_namespace.as_deref().unwrap_or("<all>"),
        controller_config.operator_image.as_deref().unwrap_or("<unset>")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let pool = ClientPool::new(
        Arc::new(HttpConnector::default()),
        controller_config.client_pool_ttl(),
    );
    let sweeper = pool.spawn_sweeper(controller_config.client_pool_sweep_interval());

    let reconciler = Arc::new(Reconciler::new(
        Stores::kube(&client),
        pool,
        controller_config.clone(),
    ));

    let namespace = controller_config.watch_namespace.as_deref();
    log_existing_resources::<TorrentServer>(&client, namespace).await;
    log_existing_resources::<TorrentClientConfiguration>(&client, namespace).await;
    log_existing_resources::<Torrent>(&client, namespace).await;

    info!("Operator initialized, starting controllers...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        controller_config,
        sweeper,
    })
}

async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &JoinHandle<()>,
    config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            anyhow::bail!("HTTP server failed to start");
        }
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            anyhow::bail!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            );
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// `Api` for a namespaced kind, scoped to `namespace` when given
pub(crate) fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Startup summary per namespace; also tells whether the CRD is installed
async fn log_existing_resources<K>(client: &Client, namespace: Option<&str>)
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug,
    K::DynamicType: Default,
{
    let kind = K::kind(&K::DynamicType::default()).into_owned();
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.existing_resources",
        resource.kind = %kind
    );
    let _guard = span.enter();

    let api = scoped_api::<K>(client, namespace);
    match api.list(&ListParams::default()).await {
        Ok(list) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.namespace().unwrap_or_default())
                    .or_default()
                    .push(item.name_any());
            }
            info!(
                "Found {} existing {} resource(s) in {} namespace(s)",
                list.items.len(),
                kind,
                by_namespace.len()
            );
            for (ns, mut names) in by_namespace {
                names.sort();
                let shown = if names.len() <= 3 {
                    names.join(", ")
                } else {
                    format!("{}, ... ({} total)", names[..3].join(", "), names.len())
                };
                info!("  {}: {}", ns, shown);
            }
        }
        Err(e) => {
            error!("{} is not queryable: {}. Is the CRD installed?", kind, e);
            error!("Installation: crdgen | kubectl apply -f -");
            warn!("Continuing; the controller will retry");
        }
    }
}
