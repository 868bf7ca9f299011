//! # Controller
//!
//! Reconcilers and the pieces they share.
//!
//! - `conditions` - Available/Degraded condition bookkeeping
//! - `resolver` - Torrent to configuration to session resolution
//! - `reconciler` - the three state machines
//! - `backoff` - Fibonacci backoff for failed reconciles
//! - `server` - metrics and probe endpoints

pub mod backoff;
pub mod conditions;
pub mod reconciler;
pub mod resolver;
pub mod server;
