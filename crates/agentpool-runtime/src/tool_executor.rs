//! Tool execution with validation, per-attempt timeout, retry and backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use agentpool_protocols::{
    ErrorPolicy, SpanKind, SpanStatus, Tool, ToolCall, ToolContext, ToolError, ToolSpanData,
    ToolSpec, ValidationStage,
};

use crate::schema;
use crate::trace::{ActiveSpan, TraceContext};

/// Resolved result of one tool call, as fed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool succeeded.
    Value(Value),
    /// Failure rendered as text under `return_error`.
    Error(String),
    /// Failure swallowed under `return_none`.
    Empty,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Value(_))
    }

    /// Text shown to the model.
    pub fn render(&self) -> String {
        match self {
            ToolOutcome::Value(Value::String(s)) => s.clone(),
            ToolOutcome::Value(v) => v.to_string(),
            ToolOutcome::Error(msg) => msg.clone(),
            ToolOutcome::Empty => "None".to_string(),
        }
    }

    fn as_value(&self) -> Option<Value> {
        match self {
            ToolOutcome::Value(v) => Some(v.clone()),
            ToolOutcome::Error(msg) => Some(Value::String(msg.clone())),
            ToolOutcome::Empty => None,
        }
    }
}

/// Record of one executed call.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub call: ToolCall,
    pub outcome: ToolOutcome,
    /// Attempts consumed. Input validation failures consume none.
    pub attempts: u32,
    /// Last failure, when the call did not succeed.
    pub error: Option<ToolError>,
    pub duration: Duration,
}

/// Runs tool calls according to each tool's [`ToolSpec`].
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor;

impl ToolExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute one call using the tool's own timeout.
    pub async fn execute(
        &self,
        tool: &dyn Tool,
        call: &ToolCall,
        agent: &str,
        trace: &TraceContext,
    ) -> Result<ToolExecution, ToolError> {
        self.execute_with_timeout(tool, call, agent, tool.spec().timeout, trace)
            .await
    }

    /// Execute one call with an explicit per-attempt timeout.
    pub async fn execute_with_timeout(
        &self,
        tool: &dyn Tool,
        call: &ToolCall,
        agent: &str,
        timeout: Option<Duration>,
        trace: &TraceContext,
    ) -> Result<ToolExecution, ToolError> {
        let spec = tool.spec();
        let started = Instant::now();
        let span = trace.start_span(SpanKind::ToolCall, &spec.name).await;

        if let Err(message) = schema::validate(&spec.input_schema, &call.arguments) {
            debug!("Tool '{}' rejected arguments: {}", spec.name, message);
            let err = ToolError::Validation {
                tool: spec.name.clone(),
                stage: ValidationStage::Input,
                message,
            };
            return resolve_failure(spec, call, 0, err, span, started).await;
        }

        let max_attempts = spec.max_retries.max(1);
        let mut attempt = 1;
        loop {
            let ctx = ToolContext::new(&call.id, agent, attempt);
            match run_attempt(tool, spec, call, ctx, timeout).await {
                Ok(value) => {
                    debug!("Tool '{}' succeeded on attempt {}", spec.name, attempt);
                    let execution = ToolExecution {
                        call: call.clone(),
                        outcome: ToolOutcome::Value(value),
                        attempts: attempt,
                        error: None,
                        duration: started.elapsed(),
                    };
                    finish_span(span, &execution, SpanStatus::Ok).await;
                    return Ok(execution);
                }
                Err(err) => {
                    warn!(
                        "Tool '{}' failed (attempt {}/{}): {}",
                        spec.name, attempt, max_attempts, err
                    );
                    if !err.is_retryable() || attempt >= max_attempts {
                        let err = with_attempts(err, attempt);
                        return resolve_failure(spec, call, attempt, err, span, started).await;
                    }
                    let delay = spec.delay_after_attempt(attempt);
                    if !delay.is_zero() {
                        debug!("Retrying tool '{}' in {:?}", spec.name, delay);
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Execute calls concurrently. Each call resolves independently under its
    /// own tool's policy; results are returned in request order.
    pub async fn execute_all(
        &self,
        tools: &[Arc<dyn Tool>],
        calls: &[ToolCall],
        agent: &str,
        trace: &TraceContext,
    ) -> Vec<Result<ToolExecution, ToolError>> {
        let futures = calls.iter().map(|call| async move {
            match tools.iter().find(|t| t.spec().name == call.name) {
                Some(tool) => self.execute(tool.as_ref(), call, agent, trace).await,
                None => Ok(missing_tool(call, tools)),
            }
        });
        join_all(futures).await
    }
}

async fn run_attempt(
    tool: &dyn Tool,
    spec: &ToolSpec,
    call: &ToolCall,
    ctx: ToolContext,
    timeout: Option<Duration>,
) -> Result<Value, ToolError> {
    let fut = tool.call(call.arguments.clone(), ctx);
    let value = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool: spec.name.clone(),
                    timeout_ms: limit.as_millis() as u64,
                });
            }
        },
        None => fut.await?,
    };

    if let Some(output_schema) = &spec.output_schema {
        schema::validate(output_schema, &value).map_err(|message| ToolError::Validation {
            tool: spec.name.clone(),
            stage: ValidationStage::Output,
            message,
        })?;
    }
    Ok(value)
}

fn with_attempts(err: ToolError, attempts: u32) -> ToolError {
    match err {
        ToolError::ExecutionFailed { tool, message, .. } => ToolError::ExecutionFailed {
            tool,
            attempts,
            message,
        },
        other => other,
    }
}

async fn resolve_failure(
    spec: &ToolSpec,
    call: &ToolCall,
    attempts: u32,
    err: ToolError,
    span: ActiveSpan,
    started: Instant,
) -> Result<ToolExecution, ToolError> {
    let status = SpanStatus::Error(err.to_string());
    let outcome = match spec.on_error {
        ErrorPolicy::Raise => {
            let mut span = span;
            span.set_tool(tool_span_data(call, None, attempts));
            span.finish(status).await;
            return Err(err);
        }
        ErrorPolicy::ReturnError => ToolOutcome::Error(format!("Error: {}", err)),
        ErrorPolicy::ReturnNone => ToolOutcome::Empty,
    };
    let execution = ToolExecution {
        call: call.clone(),
        outcome,
        attempts,
        error: Some(err),
        duration: started.elapsed(),
    };
    finish_span(span, &execution, status).await;
    Ok(execution)
}

fn missing_tool(call: &ToolCall, tools: &[Arc<dyn Tool>]) -> ToolExecution {
    let available: Vec<&str> = tools.iter().map(|t| t.spec().name.as_str()).collect();
    warn!("Model requested unknown tool '{}'", call.name);
    let err = ToolError::NotFound(call.name.clone());
    ToolExecution {
        call: call.clone(),
        outcome: ToolOutcome::Error(format!(
            "Error: {}. Available tools: {}",
            err,
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        )),
        attempts: 0,
        error: Some(err),
        duration: Duration::ZERO,
    }
}

fn tool_span_data(call: &ToolCall, output: Option<Value>, attempts: u32) -> ToolSpanData {
    ToolSpanData {
        tool: call.name.clone(),
        arguments: call.arguments.clone(),
        output,
        attempts,
    }
}

async fn finish_span(mut span: ActiveSpan, execution: &ToolExecution, status: SpanStatus) {
    span.set_tool(tool_span_data(
        &execution.call,
        execution.outcome.as_value(),
        execution.attempts,
    ));
    span.finish(status).await;
}

#[cfg(test)]
#[path = "tool_executor_tests.rs"]
mod tests;
