//! Span context threaded explicitly through pool steps, turns and tool calls.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use agentpool_protocols::{
    SpanEvent, SpanKind, SpanRecord, SpanStatus, ToolSpanData, TraceSink, Usage,
};

use crate::cost::CostTable;
use crate::trace_sinks::NoopTraceSink;

/// Trace position handed down the call chain.
#[derive(Clone)]
pub struct TraceContext {
    trace_id: Uuid,
    parent_id: Option<Uuid>,
    sink: Arc<dyn TraceSink>,
    costs: Arc<CostTable>,
}

impl TraceContext {
    /// Start a new trace.
    pub fn new(sink: Arc<dyn TraceSink>, costs: Arc<CostTable>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            parent_id: None,
            sink,
            costs,
        }
    }

    /// A context whose events go nowhere.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopTraceSink), Arc::new(CostTable::default()))
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    pub fn costs(&self) -> &CostTable {
        &self.costs
    }

    /// Context for spans nested under `span`.
    pub fn child(&self, span: &ActiveSpan) -> Self {
        Self {
            trace_id: self.trace_id,
            parent_id: Some(span.id()),
            sink: self.sink.clone(),
            costs: self.costs.clone(),
        }
    }

    /// Open a span and emit its start event.
    pub async fn start_span(&self, kind: SpanKind, name: impl Into<String>) -> ActiveSpan {
        let record = SpanRecord {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_id: self.parent_id,
            kind,
            name: name.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            usage: Usage::default(),
            cost: 0.0,
            tool: None,
            status: SpanStatus::Running,
        };
        self.sink.record(SpanEvent::Start(record.clone())).await;
        ActiveSpan {
            record,
            started: Instant::now(),
            sink: self.sink.clone(),
            costs: self.costs.clone(),
        }
    }
}

/// An open span. Dropping it without [`ActiveSpan::finish`] emits no end event.
pub struct ActiveSpan {
    record: SpanRecord,
    started: Instant,
    sink: Arc<dyn TraceSink>,
    costs: Arc<CostTable>,
}

impl ActiveSpan {
    pub fn id(&self) -> Uuid {
        self.record.span_id
    }

    pub fn usage(&self) -> Usage {
        self.record.usage
    }

    pub fn cost(&self) -> f64 {
        self.record.cost
    }

    /// Record a model completion, pricing it with the trace's cost table.
    pub fn add_model_usage(&mut self, model: &str, usage: Usage) {
        self.record.usage += usage;
        self.record.cost += self.costs.cost(model, usage);
    }

    /// Roll up totals from a finished child span.
    pub fn add_totals(&mut self, usage: Usage, cost: f64) {
        self.record.usage += usage;
        self.record.cost += cost;
    }

    pub fn set_tool(&mut self, data: ToolSpanData) {
        self.record.tool = Some(data);
    }

    /// Close the span and emit its end event. Returns the final record.
    pub async fn finish(mut self, status: SpanStatus) -> SpanRecord {
        let ended = Utc::now();
        self.record.ended_at = Some(ended);
        self.record.duration_ms = Some(self.started.elapsed().as_millis() as u64);
        self.record.status = status;
        self.sink.record(SpanEvent::End(self.record.clone())).await;
        self.record
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
