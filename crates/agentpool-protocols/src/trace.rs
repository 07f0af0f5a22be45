//! Span events emitted for observability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Pool,
    Route,
    AgentTurn,
    ModelCall,
    ToolCall,
    Summarize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Running,
    Ok,
    Error(String),
}

/// Tool-specific span payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpanData {
    pub tool: String,
    pub arguments: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    pub attempts: u32,
}

/// One span, either just opened or closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub kind: SpanKind,
    pub name: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub usage: Usage,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolSpanData>,
    pub status: SpanStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "span", rename_all = "snake_case")]
pub enum SpanEvent {
    Start(SpanRecord),
    End(SpanRecord),
}

impl SpanEvent {
    pub fn record(&self) -> &SpanRecord {
        match self {
            SpanEvent::Start(r) | SpanEvent::End(r) => r,
        }
    }
}

/// Receiver of span events. Persistence schema is up to the implementation.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn record(&self, event: SpanEvent);
}
