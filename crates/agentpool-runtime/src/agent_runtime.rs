//! Single-agent turn loop.
//!
//! One turn is an explicit state machine:
//!
//! ```text
//! AwaitingModel -> ExecutingTools -> AwaitingFollowup -> AwaitingModel ... -> Done
//! ```
//!
//! The model's reply is a tool call only when it is exactly a call descriptor
//! (see [`crate::call_parser`]). Tool rounds per turn are bounded by
//! `max_tool_hops`; asking for another round past the bound is a
//! [`RoutingError::ToolHopLimitExceeded`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use agentpool_protocols::{
    AgentError, AgentSpec, Completion, CompletionOptions, Message, ModelProvider, RoutingError,
    SpanKind, SpanStatus, ThreadId, ToolCall, Usage, render_transcript,
};

use crate::call_parser::{ModelReply, parse_reply};
use crate::context::{ContextAction, ContextManager};
use crate::prompt::{PromptRenderer, PromptVars, TemplateId, TemplateRenderer};
use crate::schema;
use crate::streaming::{TurnEvent, TurnEventSender, collect_stream};
use crate::tool_executor::{ToolExecution, ToolExecutor};
use crate::trace::{ActiveSpan, TraceContext};

/// Runtime limits for agent turns.
#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    /// Tool execution rounds allowed per turn.
    pub max_tool_hops: u32,
    /// Options passed with every model call.
    pub options: CompletionOptions,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            max_tool_hops: 5,
            options: CompletionOptions::default(),
        }
    }
}

/// Position of a turn in its state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    AwaitingFollowup,
    Done {
        text: String,
        structured: Option<Value>,
    },
}

impl TurnState {
    pub fn label(&self) -> &'static str {
        match self {
            TurnState::AwaitingModel => "awaiting_model",
            TurnState::ExecutingTools(_) => "executing_tools",
            TurnState::AwaitingFollowup => "awaiting_followup",
            TurnState::Done { .. } => "done",
        }
    }
}

/// Result of one agent turn.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub agent: String,
    /// Final answer text. For structured answers this is the compact JSON.
    pub text: String,
    /// Validated structured answer when the agent has an output schema.
    pub structured: Option<Value>,
    /// Names of tools called during the turn, in call order.
    pub tools_used: Vec<String>,
    pub usage: Usage,
    pub cost: f64,
    /// Tool execution rounds performed.
    pub hops: u32,
    pub model_calls: u32,
}

#[derive(Default)]
struct TurnProgress {
    tools_used: Vec<String>,
    scratch: Vec<String>,
    usage: Usage,
    cost: f64,
    hops: u32,
    model_calls: u32,
    schema_attempts: u32,
}

impl TurnProgress {
    fn add(&mut self, usage: Usage, cost: f64) {
        self.usage += usage;
        self.cost += cost;
    }
}

/// Drives turns for one agent.
#[derive(Clone)]
pub struct AgentRuntime {
    spec: AgentSpec,
    context: ContextManager,
    executor: ToolExecutor,
    renderer: Arc<dyn PromptRenderer>,
    config: AgentRuntimeConfig,
    events: Option<TurnEventSender>,
}

impl AgentRuntime {
    pub fn new(spec: AgentSpec, context: ContextManager) -> Self {
        Self {
            spec,
            context,
            executor: ToolExecutor::new(),
            renderer: Arc::new(TemplateRenderer::new()),
            config: AgentRuntimeConfig::default(),
            events: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_config(mut self, config: AgentRuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_tool_hops(mut self, max_tool_hops: u32) -> Self {
        self.config.max_tool_hops = max_tool_hops;
        self
    }

    /// Forward turn progress, including streamed deltas, to `events`.
    pub fn with_events(mut self, events: TurnEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    /// Single-agent call: append `input` as a user message, run one turn and
    /// append the answer attributed to this agent.
    pub async fn run(
        &self,
        thread: &ThreadId,
        input: &str,
        trace: &TraceContext,
    ) -> Result<TurnOutput, AgentError> {
        self.context.append(thread, Message::user(input)).await?;
        let output = self.run_turn(thread, "", trace).await?;
        self.context
            .append(thread, Message::assistant(&output.text).with_agent(self.name()))
            .await?;
        Ok(output)
    }

    /// Run one turn over the current thread. The thread is read, possibly
    /// summarized, but never appended to; the caller records the answer.
    pub async fn run_turn(
        &self,
        thread: &ThreadId,
        instructions: &str,
        trace: &TraceContext,
    ) -> Result<TurnOutput, AgentError> {
        let model = self
            .spec
            .model
            .clone()
            .ok_or_else(|| AgentError::NoModel(self.spec.name.clone()))?;

        let mut span = trace.start_span(SpanKind::AgentTurn, &self.spec.name).await;
        let turn_trace = trace.child(&span);
        let mut progress = TurnProgress::default();

        let result = self
            .drive(thread, instructions, model.as_ref(), &turn_trace, &mut progress)
            .await;
        span.add_totals(progress.usage, progress.cost);
        finish_turn_span(span, &result).await;

        let (text, structured) = result?;
        info!(
            "Agent '{}' finished turn: {} hop(s), {} model call(s), {} tokens",
            self.spec.name,
            progress.hops,
            progress.model_calls,
            progress.usage.total_tokens()
        );
        self.emit(TurnEvent::TurnComplete {
            agent: self.spec.name.clone(),
            output: text.clone(),
        })
        .await;

        Ok(TurnOutput {
            agent: self.spec.name.clone(),
            text,
            structured,
            tools_used: progress.tools_used,
            usage: progress.usage,
            cost: progress.cost,
            hops: progress.hops,
            model_calls: progress.model_calls,
        })
    }

    async fn drive(
        &self,
        thread: &ThreadId,
        instructions: &str,
        model: &dyn ModelProvider,
        trace: &TraceContext,
        progress: &mut TurnProgress,
    ) -> Result<(String, Option<Value>), AgentError> {
        self.emit(TurnEvent::TurnStart {
            agent: self.spec.name.clone(),
        })
        .await;

        let summarizer = self.context.summarizer_for(&self.spec);
        let view = self
            .context
            .view(thread, &self.spec.context_policy, summarizer.as_deref(), trace)
            .await?;
        if let ContextAction::Summarized { usage, cost, .. } = view.action {
            progress.add(usage, cost);
        }

        let base = self.base_vars(&view.messages, instructions);
        let mut prompt = self.renderer.render(TemplateId::Turn, &base);
        let mut state = TurnState::AwaitingModel;

        loop {
            debug!("Agent '{}' turn state: {}", self.spec.name, state.label());
            state = match state {
                TurnState::AwaitingModel => {
                    let completion = self.complete(model, &prompt, trace, progress).await?;
                    match parse_reply(&completion.text) {
                        ModelReply::ToolCalls(calls) => TurnState::ExecutingTools(calls),
                        ModelReply::Final(text) => match self.accept(text, &base, progress)? {
                            Ok((text, structured)) => TurnState::Done { text, structured },
                            Err(retry_prompt) => {
                                prompt = retry_prompt;
                                TurnState::AwaitingModel
                            }
                        },
                    }
                }
                TurnState::ExecutingTools(calls) => {
                    if progress.hops >= self.config.max_tool_hops {
                        warn!(
                            "Agent '{}' exceeded {} tool hop(s)",
                            self.spec.name, self.config.max_tool_hops
                        );
                        return Err(RoutingError::ToolHopLimitExceeded {
                            agent: self.spec.name.clone(),
                            limit: self.config.max_tool_hops,
                        }
                        .into());
                    }
                    progress.hops += 1;
                    self.execute_tools(&calls, trace, progress).await?;
                    TurnState::AwaitingFollowup
                }
                TurnState::AwaitingFollowup => {
                    let vars = base
                        .clone()
                        .with("tool_results", progress.scratch.join("\n\n"));
                    prompt = self.renderer.render(TemplateId::FollowUp, &vars);
                    TurnState::AwaitingModel
                }
                TurnState::Done { text, structured } => return Ok((text, structured)),
            };
        }
    }

    fn base_vars(&self, view: &[Message], instructions: &str) -> PromptVars {
        let mut sections = Vec::new();
        if self.spec.has_tools() {
            let tools = self
                .spec
                .tools
                .iter()
                .map(|t| t.spec().prompt_entry().to_string())
                .collect::<Vec<_>>()
                .join("\n");
            let vars = PromptVars::new().with("tools", tools);
            sections.push(self.renderer.render(TemplateId::Tools, &vars));
        } else {
            sections.push(self.renderer.render(TemplateId::NoTools, &PromptVars::new()));
        }
        if let Some(output_schema) = &self.spec.output_schema {
            let vars = PromptVars::new().with("schema", pretty(output_schema));
            sections.push(self.renderer.render(TemplateId::OutputFormat, &vars));
        }

        let router_instructions = if instructions.trim().is_empty() {
            String::new()
        } else {
            format!("\n\nInstructions for this turn: {}", instructions.trim())
        };

        PromptVars::new()
            .with("persona", self.spec.persona.clone())
            .with("instructions", sections.join("\n\n"))
            .with("conversation", render_transcript(view))
            .with("router_instructions", router_instructions)
    }

    /// Accept a final answer, or build the schema retry prompt.
    fn accept(
        &self,
        text: String,
        base: &PromptVars,
        progress: &mut TurnProgress,
    ) -> Result<Result<(String, Option<Value>), String>, AgentError> {
        let Some(output_schema) = &self.spec.output_schema else {
            return Ok(Ok((text.trim().to_string(), None)));
        };

        progress.schema_attempts += 1;
        let checked = schema::parse_structured(&text)
            .and_then(|value| schema::validate(output_schema, &value).map(|_| value));
        let message = match checked {
            Ok(value) => return Ok(Ok((value.to_string(), Some(value)))),
            Err(message) => message,
        };

        let max_attempts = self.spec.schema_failure.max_attempts();
        warn!(
            "Agent '{}' answer failed schema validation ({}/{}): {}",
            self.spec.name, progress.schema_attempts, max_attempts, message
        );
        if progress.schema_attempts >= max_attempts {
            return Err(AgentError::SchemaValidation {
                agent: self.spec.name.clone(),
                attempts: progress.schema_attempts,
                message,
            });
        }

        let tool_activity = if progress.scratch.is_empty() {
            String::new()
        } else {
            format!("\n\nTool activity in this turn:\n{}", progress.scratch.join("\n\n"))
        };
        let vars = base
            .clone()
            .with("tool_activity", tool_activity)
            .with("previous_answer", text)
            .with("validation_error", message)
            .with("schema", pretty(output_schema));
        Ok(Err(self.renderer.render(TemplateId::SchemaRetry, &vars)))
    }

    async fn complete(
        &self,
        model: &dyn ModelProvider,
        prompt: &str,
        trace: &TraceContext,
        progress: &mut TurnProgress,
    ) -> Result<Completion, AgentError> {
        let mut span = trace.start_span(SpanKind::ModelCall, model.model_name()).await;
        let options = &self.config.options;

        let result = if self.spec.stream {
            match model.complete_stream(prompt, options).await {
                Ok(stream) => {
                    collect_stream(stream, |content| {
                        let events = self.events.clone();
                        let agent = self.spec.name.clone();
                        async move {
                            if let Some(tx) = events {
                                let _ = tx.send(TurnEvent::TextDelta { agent, content }).await;
                            }
                        }
                    })
                    .await
                }
                Err(e) => Err(e),
            }
        } else {
            model.complete(prompt, options).await
        };

        progress.model_calls += 1;
        match result {
            Ok(completion) => {
                span.add_model_usage(model.model_name(), completion.usage);
                let record = span.finish(SpanStatus::Ok).await;
                progress.add(record.usage, record.cost);
                Ok(completion)
            }
            Err(e) => {
                warn!("Model call for agent '{}' failed: {}", self.spec.name, e);
                span.finish(SpanStatus::Error(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    async fn execute_tools(
        &self,
        calls: &[ToolCall],
        trace: &TraceContext,
        progress: &mut TurnProgress,
    ) -> Result<(), AgentError> {
        for call in calls {
            self.emit(TurnEvent::ToolCallStart {
                agent: self.spec.name.clone(),
                id: call.id.clone(),
                name: call.name.clone(),
            })
            .await;
        }

        let results = self
            .executor
            .execute_all(&self.spec.tools, calls, &self.spec.name, trace)
            .await;

        let mut executions: Vec<ToolExecution> = Vec::with_capacity(results.len());
        for result in results {
            executions.push(result?);
        }

        for execution in executions {
            let rendered = execution.outcome.render();
            progress.tools_used.push(execution.call.name.clone());
            progress.scratch.push(format!(
                "Tool: {}\nArguments: {}\nResult: {}",
                execution.call.name,
                execution.call.arguments,
                rendered
            ));
            self.emit(TurnEvent::ToolCallComplete {
                agent: self.spec.name.clone(),
                id: execution.call.id.clone(),
                result: rendered,
            })
            .await;
        }
        Ok(())
    }

    async fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).await.is_err() {
                debug!("Turn event receiver dropped");
            }
        }
    }
}

async fn finish_turn_span<T>(span: ActiveSpan, result: &Result<T, AgentError>) {
    let status = match result {
        Ok(_) => SpanStatus::Ok,
        Err(e) => SpanStatus::Error(e.to_string()),
    };
    span.finish(status).await;
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
#[path = "agent_runtime_tests.rs"]
mod tests;
