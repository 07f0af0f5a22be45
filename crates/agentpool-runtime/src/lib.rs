//! # agentpool runtime
//!
//! Tool execution, bounded conversation context, the single-agent turn loop
//! and the multi-agent routing pool.

pub mod agent_runtime;
pub mod call_parser;
pub mod context;
pub mod cost;
pub mod file_store;
pub mod memory_store;
pub mod pool;
pub mod prompt;
pub mod router;
pub mod schema;
pub mod settings;
pub mod streaming;
pub mod summarizer;
pub mod tool_executor;
pub mod trace;
pub mod trace_sinks;

pub use agent_runtime::{AgentRuntime, AgentRuntimeConfig, TurnOutput, TurnState};
pub use call_parser::{ModelReply, parse_reply};
pub use context::{ContextAction, ContextManager, ContextView, SUMMARY_PREFIX, trim_view};
pub use cost::{CostTable, ModelPrice};
pub use file_store::FileHistoryStore;
pub use memory_store::MemoryHistoryStore;
pub use pool::{Pool, PoolOutcome};
pub use prompt::{PromptRenderer, PromptVars, TemplateId, TemplateRenderer};
pub use router::{FnRouter, ModelRouter, RoundRobinRouter, SequenceRouter, parse_agent_choice};
pub use streaming::{TurnEvent, TurnEventSender, TurnEventStream, collect_stream};
pub use summarizer::{ModelSummarizer, Summarizer};
pub use tool_executor::{ToolExecution, ToolExecutor, ToolOutcome};
pub use trace::{ActiveSpan, TraceContext};
pub use trace_sinks::{JsonlTraceSink, LogTraceSink, MemoryTraceSink, NoopTraceSink, TraceTotals};
