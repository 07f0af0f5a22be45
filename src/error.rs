//! Setup errors.

use thiserror::Error;

use agentpool_config::ConfigError;
use agentpool_protocols::HistoryStoreError;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("History store error: {0}")]
    HistoryStore(#[from] HistoryStoreError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
