//! Trace sink implementations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agentpool_protocols::{SpanEvent, SpanRecord, SpanStatus, TraceSink, Usage};

/// Discards every event.
pub struct NoopTraceSink;

#[async_trait]
impl TraceSink for NoopTraceSink {
    async fn record(&self, _event: SpanEvent) {}
}

/// Emits span events through `tracing`.
pub struct LogTraceSink;

#[async_trait]
impl TraceSink for LogTraceSink {
    async fn record(&self, event: SpanEvent) {
        match event {
            SpanEvent::Start(span) => debug!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                kind = ?span.kind,
                "span started: {}",
                span.name
            ),
            SpanEvent::End(span) => info!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                kind = ?span.kind,
                duration_ms = span.duration_ms.unwrap_or(0),
                prompt_tokens = span.usage.prompt_tokens,
                completion_tokens = span.usage.completion_tokens,
                cost = span.cost,
                "span finished: {} ({:?})",
                span.name,
                span.status
            ),
        }
    }
}

/// Aggregated token usage and cost of one trace.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TraceTotals {
    pub usage: Usage,
    pub cost: f64,
    pub spans: usize,
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct MemoryTraceSink {
    events: Mutex<Vec<SpanEvent>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SpanEvent> {
        self.events.lock().clone()
    }

    /// Closed spans in completion order.
    pub fn finished(&self) -> Vec<SpanRecord> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SpanEvent::End(r) => Some(r.clone()),
                SpanEvent::Start(_) => None,
            })
            .collect()
    }

    /// Totals over root spans of a trace, so nested usage is not double counted.
    pub fn totals(&self, trace_id: Uuid) -> TraceTotals {
        let finished: Vec<SpanRecord> = self
            .finished()
            .into_iter()
            .filter(|r| r.trace_id == trace_id)
            .collect();
        let mut totals = TraceTotals {
            spans: finished.len(),
            ..Default::default()
        };
        for root in finished.iter().filter(|r| r.parent_id.is_none()) {
            totals.usage += root.usage;
            totals.cost += root.cost;
        }
        totals
    }

    pub fn error_count(&self) -> usize {
        self.finished()
            .iter()
            .filter(|r| matches!(r.status, SpanStatus::Error(_)))
            .count()
    }
}

#[async_trait]
impl TraceSink for MemoryTraceSink {
    async fn record(&self, event: SpanEvent) {
        self.events.lock().push(event);
    }
}

/// Appends span events to a JSONL file.
pub struct JsonlTraceSink {
    path: PathBuf,
    file: tokio::sync::Mutex<File>,
}

impl JsonlTraceSink {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        debug!("Opened trace file: {:?}", path);

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, event: &SpanEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(event)?;
        let mut file = self.file.lock().await;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl TraceSink for JsonlTraceSink {
    async fn record(&self, event: SpanEvent) {
        if let Err(e) = self.write(&event).await {
            warn!("Failed to write trace event to {:?}: {}", self.path, e);
        }
    }
}
