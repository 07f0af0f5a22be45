//! SQLite history store for agentpool.
//!
//! Threads and their messages are kept in two tables; every append runs in
//! its own transaction.

mod schema;
mod store;

pub use store::SqliteHistoryStore;
