//! Routing errors.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("Router selected unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("Agent '{agent}' exceeded the limit of {limit} tool hop(s) in one turn")]
    ToolHopLimitExceeded { agent: String, limit: u32 },

    #[error("Agent '{0}' is already registered in the pool")]
    DuplicateAgent(String),

    #[error("Pool has no agents")]
    EmptyPool,

    #[error("Router failed: {0}")]
    RouterFailed(String),
}
