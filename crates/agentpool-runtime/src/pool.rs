//! Multi-agent pool: the routing controller.
//!
//! A pool owns one shared thread per run and executes agent turns strictly
//! one at a time. Before every turn the router sees the bounded thread view,
//! the roster and the previous turn's result; the chosen agent's answer is
//! appended to the thread before the next decision is computed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agentpool_protocols::{
    AgentProfile, AgentSpec, ContextPolicy, ContextStrategy, HistoryStore, LastResult, Message,
    Metadata, ModelProvider, PoolError, PoolState, Router, RouterDecision, RoutingError,
    RoutingState, SpanKind, SpanStatus, ThreadId, TraceSink, Usage,
};

use crate::agent_runtime::{AgentRuntime, AgentRuntimeConfig, TurnOutput};
use crate::context::{ContextManager, trim_view};
use crate::cost::CostTable;
use crate::prompt::{PromptRenderer, TemplateRenderer};
use crate::router::RoundRobinRouter;
use crate::streaming::TurnEventSender;
use crate::trace::TraceContext;
use crate::trace_sinks::NoopTraceSink;

/// Result of a pool run.
#[derive(Debug, Clone)]
pub struct PoolOutcome {
    pub thread: ThreadId,
    /// Stored thread after the run.
    pub messages: Vec<Message>,
    pub last_agent: Option<String>,
    pub last_output: Option<String>,
    /// Agent turns executed.
    pub iterations: u32,
    /// `max_iter` was reached before the router stopped.
    pub truncated: bool,
    pub usage: Usage,
    pub cost: f64,
    pub trace_id: Uuid,
    /// Router key/value store as the run left it.
    pub state: HashMap<String, Value>,
}

struct RunProgress {
    state: PoolState,
    last_agent: Option<String>,
    last_result: Option<LastResult>,
    iterations: u32,
    truncated: bool,
    usage: Usage,
    cost: f64,
}

impl RunProgress {
    fn new(state: PoolState) -> Self {
        Self {
            state,
            last_agent: None,
            last_result: None,
            iterations: 0,
            truncated: false,
            usage: Usage::default(),
            cost: 0.0,
        }
    }

    fn record(&mut self, output: TurnOutput) {
        self.usage += output.usage;
        self.cost += output.cost;
        self.iterations += 1;
        self.last_agent = Some(output.agent.clone());
        self.last_result = Some(LastResult {
            agent: output.agent,
            output: output.text,
            tools_used: output.tools_used,
        });
    }
}

/// Orchestrates agents over a shared thread.
pub struct Pool {
    agents: Vec<AgentSpec>,
    context: ContextManager,
    router: Arc<dyn Router>,
    default_model: Option<Arc<dyn ModelProvider>>,
    max_iter: u32,
    router_view: ContextPolicy,
    runtime_config: AgentRuntimeConfig,
    renderer: Arc<dyn PromptRenderer>,
    trace_sink: Arc<dyn TraceSink>,
    costs: Arc<CostTable>,
    initial_state: HashMap<String, Value>,
    events: Option<TurnEventSender>,
}

impl Pool {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            agents: Vec::new(),
            context: ContextManager::new(store),
            router: Arc::new(RoundRobinRouter::default()),
            default_model: None,
            max_iter: 5,
            router_view: ContextPolicy::new(20, ContextStrategy::TrimLast),
            runtime_config: AgentRuntimeConfig::default(),
            renderer: Arc::new(TemplateRenderer::new()),
            trace_sink: Arc::new(NoopTraceSink),
            costs: Arc::new(CostTable::default()),
            initial_state: HashMap::new(),
            events: None,
        }
    }

    /// Model for agents registered without one.
    pub fn with_default_model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        for agent in self.agents.iter_mut().filter(|a| a.model.is_none()) {
            agent.model = Some(model.clone());
        }
        self.default_model = Some(model);
        self
    }

    /// Register an agent. Names must be unique within the pool.
    pub fn with_agent(mut self, mut agent: AgentSpec) -> Result<Self, RoutingError> {
        if self.agent(&agent.name).is_some() {
            return Err(RoutingError::DuplicateAgent(agent.name));
        }
        if agent.model.is_none() {
            agent.model = self.default_model.clone();
        }
        self.agents.push(agent);
        Ok(self)
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = router;
        self
    }

    pub fn with_max_iter(mut self, max_iter: u32) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Bound on the thread view shown to the router.
    pub fn with_router_view(mut self, max_messages: usize) -> Self {
        self.router_view = ContextPolicy::new(max_messages, ContextStrategy::TrimLast);
        self
    }

    pub fn with_runtime_config(mut self, config: AgentRuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.context = self.context.with_renderer(renderer.clone());
        self.renderer = renderer;
        self
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace_sink = sink;
        self
    }

    pub fn with_cost_table(mut self, costs: CostTable) -> Self {
        self.costs = Arc::new(costs);
        self
    }

    /// Values every run's router store starts from. Each run works on its
    /// own copy.
    pub fn with_state(mut self, initial: HashMap<String, Value>) -> Self {
        self.initial_state = initial;
        self
    }

    pub fn with_events(mut self, events: TurnEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Agents in registration order.
    pub fn roster(&self) -> Vec<AgentProfile> {
        self.agents.iter().map(AgentSpec::profile).collect()
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn initial_state(&self) -> &HashMap<String, Value> {
        &self.initial_state
    }

    /// Run on a fresh thread.
    pub async fn run(&self, input: &str) -> Result<PoolOutcome, PoolError> {
        let thread = self.context.store().create_thread(Metadata::new()).await?;
        self.run_on(&thread, input).await
    }

    /// Run on an existing, possibly pre-seeded thread. The caller must not use
    /// the same thread concurrently.
    pub async fn run_on(&self, thread: &ThreadId, input: &str) -> Result<PoolOutcome, PoolError> {
        if self.agents.is_empty() {
            return Err(RoutingError::EmptyPool.into());
        }

        let trace = TraceContext::new(self.trace_sink.clone(), self.costs.clone());
        let mut span = trace.start_span(SpanKind::Pool, "pool").await;
        let pool_trace = trace.child(&span);
        let mut progress = RunProgress::new(PoolState::from(self.initial_state.clone()));

        let result = self.drive(thread, input, &pool_trace, &mut progress).await;
        span.add_totals(progress.usage, progress.cost);
        let status = match &result {
            Ok(()) => SpanStatus::Ok,
            Err(e) => SpanStatus::Error(e.to_string()),
        };
        span.finish(status).await;
        result?;

        let messages = self.context.get(thread).await?;
        Ok(PoolOutcome {
            thread: thread.clone(),
            messages,
            last_agent: progress.last_agent,
            last_output: progress.last_result.map(|r| r.output),
            iterations: progress.iterations,
            truncated: progress.truncated,
            usage: progress.usage,
            cost: progress.cost,
            trace_id: trace.trace_id(),
            state: progress.state.snapshot(),
        })
    }

    async fn drive(
        &self,
        thread: &ThreadId,
        input: &str,
        trace: &TraceContext,
        progress: &mut RunProgress,
    ) -> Result<(), PoolError> {
        self.context.append(thread, Message::user(input)).await?;
        let roster = self.roster();

        loop {
            if progress.iterations >= self.max_iter {
                warn!(
                    "Pool reached max_iter={} without a stop decision, truncating",
                    self.max_iter
                );
                progress.truncated = true;
                return Ok(());
            }

            let thread_messages = self.context.get(thread).await?;
            let routing_state = RoutingState {
                view: trim_view(&thread_messages, &self.router_view),
                roster: roster.clone(),
                last_agent: progress.last_agent.clone(),
                last_result: progress.last_result.clone(),
                iteration: progress.iterations,
                max_iter: self.max_iter,
                state: progress.state.clone(),
            };

            let decision = self.route(&routing_state, trace, progress).await?;
            let Some(name) = decision.next_agent else {
                info!("Router stopped the pool after {} turn(s)", progress.iterations);
                return Ok(());
            };
            let spec = self
                .agent(&name)
                .ok_or_else(|| RoutingError::UnknownAgent(name.clone()))?;

            debug!("Iteration {}: routing to '{}'", progress.iterations + 1, name);
            let output = self
                .runtime_for(spec)
                .run_turn(thread, &decision.instructions, trace)
                .await
                .map_err(|source| PoolError::Agent {
                    agent: name.clone(),
                    source,
                })?;

            self.context
                .append(thread, Message::assistant(&output.text).with_agent(&name))
                .await?;
            progress.record(output);
        }
    }

    /// One routing decision inside its own span. Router model tokens count
    /// towards the run totals.
    async fn route(
        &self,
        state: &RoutingState,
        trace: &TraceContext,
        progress: &mut RunProgress,
    ) -> Result<RouterDecision, RoutingError> {
        let mut span = trace.start_span(SpanKind::Route, "router").await;
        let decided = self.router.decide(state).await;
        if let Ok(RouterDecision {
            usage: Some(spent), ..
        }) = &decided
        {
            span.add_model_usage(&spent.model, spent.usage);
        }
        let status = match &decided {
            Ok(_) => SpanStatus::Ok,
            Err(e) => SpanStatus::Error(e.to_string()),
        };
        let record = span.finish(status).await;
        progress.usage += record.usage;
        progress.cost += record.cost;
        decided
    }

    fn runtime_for(&self, spec: &AgentSpec) -> AgentRuntime {
        let runtime = AgentRuntime::new(spec.clone(), self.context.clone())
            .with_renderer(self.renderer.clone())
            .with_config(self.runtime_config.clone());
        match &self.events {
            Some(events) => runtime.with_events(events.clone()),
            None => runtime,
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
