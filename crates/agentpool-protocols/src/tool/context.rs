//! Tool call descriptors and execution context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parsed request from the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// Per-attempt context handed to a tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Id of the call being executed.
    pub call_id: String,

    /// Agent that requested the call.
    pub agent: String,

    /// 1-based attempt number.
    pub attempt: u32,
}

impl ToolContext {
    pub fn new(call_id: impl Into<String>, agent: impl Into<String>, attempt: u32) -> Self {
        Self {
            call_id: call_id.into(),
            agent: agent.into(),
            attempt,
        }
    }
}
