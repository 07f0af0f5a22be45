//! Tool execution errors.

use std::fmt;

use thiserror::Error;

/// Which side of a tool call failed schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Input,
    Output,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Input => write!(f, "input"),
            ValidationStage::Output => write!(f, "output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool '{tool}' failed after {attempts} attempt(s): {message}")]
    ExecutionFailed {
        tool: String,
        attempts: u32,
        message: String,
    },

    #[error("Tool '{tool}' {stage} validation failed: {message}")]
    Validation {
        tool: String,
        stage: ValidationStage,
        message: String,
    },

    #[error("Tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Tool execution was cancelled")]
    Cancelled,
}

impl ToolError {
    /// Create the failure a tool implementation returns from a single attempt.
    pub fn failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            attempts: 1,
            message: message.into(),
        }
    }

    /// Whether another attempt may be made after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ToolError::ExecutionFailed { .. } | ToolError::Timeout { .. } => true,
            ToolError::Validation { stage, .. } => *stage == ValidationStage::Output,
            ToolError::NotFound(_) | ToolError::Cancelled => false,
        }
    }
}
