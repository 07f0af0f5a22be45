//! # agentpool
//!
//! Multi-agent pool runtime: tools with retry and timeout policies, bounded
//! conversation context, a single-agent turn loop and a routing pool.
//!
//! This crate re-exports the workspace crates and owns process-level setup
//! (logging and history backend selection).

pub mod error;
pub mod logging;
pub mod store;

pub use agentpool_config as config;
pub use agentpool_history_sqlite as history_sqlite;
pub use agentpool_protocols as protocols;
pub use agentpool_runtime as runtime;

pub use error::SetupError;
pub use logging::init_logging;
pub use store::open_history_store;
