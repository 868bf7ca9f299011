//! # Reconciler
//!
//! State machines for the three custom resources:
//!
//! - [`torrent`] - keeps a magnet link registered on qBittorrent and
//!   cleans it up behind a finalizer
//! - [`client_configuration`] - probes a WebUI endpoint and publishes
//!   whether it can be used
//! - [`torrent_server`] - deploys qBittorrent and wires a configuration to it
//!
//! Each exposes `reconcile(ctx, namespace, name)`, which loads the object
//! through the store and returns the next [`Action`], plus a thin
//! `kube_runtime` entry point that adds metrics and a tracing span.

pub mod client_configuration;
pub mod resources;
pub mod torrent;
pub mod torrent_server;
mod types;
pub mod validation;

pub use types::{
    resource_key, BackoffState, MemoryStores, Reconciler, ReconcilerError, Stores,
};

use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Requeue after `after`, counting the reason
pub(crate) fn requeue(after: Duration, reason: &str) -> Action {
    metrics::increment_requeues_total(reason);
    Action::requeue(after)
}

/// RFC3339 timestamp for status fields
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Run one reconcile with a span, duration and counters; resets the
/// resource's error backoff when it succeeds
pub(crate) async fn instrumented<K, F, Fut>(
    kind: &'static str,
    obj: &K,
    ctx: &Reconciler,
    reconcile: F,
) -> Result<Action, ReconcilerError>
where
    K: kube::Resource,
    F: FnOnce(String, String) -> Fut,
    Fut: Future<Output = Result<Action, ReconcilerError>>,
{
    let name = obj.name_any();
    let namespace = obj
        .namespace()
        .ok_or(ReconcilerError::MissingMetadata("metadata.namespace"))?;

    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.reconcile",
        resource.kind = kind,
        resource.name = %name,
        resource.namespace = %namespace
    );

    metrics::increment_reconciliations(kind);
    let start = Instant::now();
    let key = resource_key(kind, &namespace, &name);
    let result = reconcile(namespace, name).instrument(span).await;
    metrics::observe_reconciliation_duration(kind, start.elapsed().as_secs_f64());

    if result.is_ok() {
        ctx.reset_backoff(&key);
    }
    result
}
