//! # Runtime
//!
//! Process startup and the controller loops.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use error_policy::handle_reconciliation_error;
pub use initialization::{init_tracing, initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
