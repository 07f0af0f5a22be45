//! Tool trait definition.

use async_trait::async_trait;

use super::{ToolContext, ToolSpec};
use crate::error::ToolError;

/// Core trait for tools.
///
/// `call` is treated as opaque and possibly side-effecting; the runtime makes
/// no idempotence assumption beyond what the tool's retry policy allows.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool specification.
    fn spec(&self) -> &ToolSpec;

    /// Invoke the tool once.
    async fn call(
        &self,
        args: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<serde_json::Value, ToolError>;

    fn name(&self) -> &str {
        &self.spec().name
    }
}
