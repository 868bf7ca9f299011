//! # Metrics Module
//!
//! Prometheus metrics for monitoring the operator, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text encoding
//! - `controller_metrics` - Reconciliations, errors, durations and requeues
//! - `client_metrics` - qBittorrent logins, pooled sessions and torrent operations

pub mod client_metrics;
pub mod controller_metrics;
pub mod registry;

pub use client_metrics::*;
pub use controller_metrics::*;
pub use registry::*;
