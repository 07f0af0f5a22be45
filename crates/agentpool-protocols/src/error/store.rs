//! History store errors.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum HistoryStoreError {
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<std::io::Error> for HistoryStoreError {
    fn from(e: std::io::Error) -> Self {
        HistoryStoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for HistoryStoreError {
    fn from(e: serde_json::Error) -> Self {
        HistoryStoreError::Serialization(e.to_string())
    }
}
