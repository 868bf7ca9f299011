//! # Client Metrics
//!
//! qBittorrent session and torrent operation metrics.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge};
use std::sync::LazyLock;

static QBITTORRENT_LOGINS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "qbittorrent_operator_qbittorrent_logins_total",
        "Total number of successful qBittorrent WebUI logins",
    )
    .expect("Failed to create QBITTORRENT_LOGINS_TOTAL metric - this should never happen")
});

static CLIENT_POOL_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "qbittorrent_operator_client_pool_size",
        "Current number of cached qBittorrent sessions",
    )
    .expect("Failed to create CLIENT_POOL_SIZE metric - this should never happen")
});

static TORRENT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "qbittorrent_operator_torrent_operations_total",
            "Total number of torrent operations sent to qBittorrent",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create TORRENT_OPERATIONS_TOTAL metric - this should never happen")
});

pub(crate) fn register_client_metrics() -> Result<()> {
    REGISTRY.register(Box::new(QBITTORRENT_LOGINS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CLIENT_POOL_SIZE.clone()))?;
    REGISTRY.register(Box::new(TORRENT_OPERATIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_qbittorrent_logins() {
    QBITTORRENT_LOGINS_TOTAL.inc();
}

pub fn set_client_pool_size(size: usize) {
    CLIENT_POOL_SIZE.set(i64::try_from(size).unwrap_or(i64::MAX));
}

/// Count an add/delete sent to qBittorrent; `result` is `success` or `error`
pub fn increment_torrent_operations(operation: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    TORRENT_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}
