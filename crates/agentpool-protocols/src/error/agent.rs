//! Agent turn and pool errors.

use thiserror::Error;

use super::{HistoryStoreError, ModelError, RoutingError, ToolError};

/// Error that aborts a single agent turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Tool timed out: {0}")]
    ToolTimeout(ToolError),

    #[error("Tool execution failed: {0}")]
    ToolExecution(ToolError),

    #[error("Tool validation failed: {0}")]
    ToolValidation(ToolError),

    #[error("Agent '{agent}' output failed schema validation after {attempts} attempt(s): {message}")]
    SchemaValidation {
        agent: String,
        attempts: u32,
        message: String,
    },

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("History store error: {0}")]
    HistoryStore(#[from] HistoryStoreError),

    #[error("Agent '{0}' has no model configured")]
    NoModel(String),
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { .. } => AgentError::ToolTimeout(err),
            ToolError::Validation { .. } => AgentError::ToolValidation(err),
            _ => AgentError::ToolExecution(err),
        }
    }
}

/// Error that aborts a pool run.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Agent '{agent}' failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: AgentError,
    },

    #[error("History store error: {0}")]
    HistoryStore(#[from] HistoryStoreError),
}
