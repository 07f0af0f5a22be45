//! # agentpool protocols
//!
//! Data model, error taxonomy and the interfaces the runtime consumes or exposes.
//! Contains only definitions - no execution logic.
//!
//! ## Core Traits
//!
//! - [`ModelProvider`] - Opaque completion capability
//! - [`Tool`] - Callable tool implementations
//! - [`HistoryStore`] - Pluggable thread persistence
//! - [`Router`] - Decides which pool agent acts next
//! - [`TraceSink`] - Receives span start/end events

pub mod agent;
pub mod error;
pub mod provider;
pub mod router;
pub mod store;
pub mod tool;
pub mod trace;
pub mod types;

pub use agent::{AgentSpec, ContextPolicy, ContextStrategy, SchemaFailurePolicy};
pub use error::{
    AgentError, HistoryStoreError, ModelError, PoolError, RoutingError, ToolError, ValidationStage,
};
pub use provider::{Completion, CompletionOptions, CompletionStream, ModelProvider, StreamEvent};
pub use router::{
    AgentProfile, LastResult, PoolState, Router, RouterDecision, RouterUsage, RoutingState,
};
pub use store::{HistoryStore, ThreadInfo};
pub use tool::{ErrorPolicy, Tool, ToolCall, ToolContext, ToolSpec};
pub use trace::{SpanEvent, SpanKind, SpanRecord, SpanStatus, ToolSpanData, TraceSink};
pub use types::*;
