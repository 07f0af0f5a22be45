//! Built-in routers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use agentpool_protocols::{
    CompletionOptions, ModelProvider, Router, RouterDecision, RoutingError, RoutingState,
    render_transcript,
};

use crate::prompt::{PromptRenderer, PromptVars, TemplateId, TemplateRenderer};

/// Router backed by a closure.
pub struct FnRouter<F> {
    decide: F,
}

impl<F> FnRouter<F>
where
    F: Fn(&RoutingState) -> RouterDecision + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

#[async_trait]
impl<F> Router for FnRouter<F>
where
    F: Fn(&RoutingState) -> RouterDecision + Send + Sync,
{
    async fn decide(&self, state: &RoutingState) -> Result<RouterDecision, RoutingError> {
        Ok((self.decide)(state))
    }
}

/// Cycles through the roster in registration order, `rounds` times, then stops.
#[derive(Debug, Clone)]
pub struct RoundRobinRouter {
    rounds: u32,
}

impl RoundRobinRouter {
    pub fn new(rounds: u32) -> Self {
        Self { rounds }
    }
}

impl Default for RoundRobinRouter {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl Router for RoundRobinRouter {
    async fn decide(&self, state: &RoutingState) -> Result<RouterDecision, RoutingError> {
        if state.roster.is_empty() {
            return Err(RoutingError::EmptyPool);
        }
        let roster_len = u32::try_from(state.roster.len()).unwrap_or(u32::MAX);
        let turns = roster_len.saturating_mul(self.rounds);
        if state.iteration >= turns {
            return Ok(RouterDecision::stop());
        }
        let index = state.iteration as usize % state.roster.len();
        Ok(RouterDecision::next(state.roster[index].name.clone()))
    }
}

/// Returns a fixed list of agents, one per iteration, then stops.
#[derive(Debug, Clone)]
pub struct SequenceRouter {
    sequence: Vec<String>,
}

impl SequenceRouter {
    pub fn new<I, S>(sequence: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sequence: sequence.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Router for SequenceRouter {
    async fn decide(&self, state: &RoutingState) -> Result<RouterDecision, RoutingError> {
        Ok(self
            .sequence
            .get(state.iteration as usize)
            .map(|name| RouterDecision::next(name.clone()))
            .unwrap_or_else(RouterDecision::stop))
    }
}

/// Model-backed router.
///
/// The prompt lists the roster and the conversation view and asks for the
/// next agent's name or `STOP`. It asks the model not to pick the previous
/// agent again, but the reply is not checked against that.
pub struct ModelRouter {
    model: Arc<dyn ModelProvider>,
    renderer: Arc<dyn PromptRenderer>,
    options: CompletionOptions,
    last_reply: Mutex<Option<String>>,
}

impl ModelRouter {
    pub fn new(model: Arc<dyn ModelProvider>) -> Self {
        Self {
            model,
            renderer: Arc::new(TemplateRenderer::new()),
            options: CompletionOptions::default()
                .with_temperature(0.0)
                .with_max_tokens(32),
            last_reply: Mutex::new(None),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Raw text of the most recent model reply.
    pub fn last_reply(&self) -> Option<String> {
        self.last_reply.lock().clone()
    }

    fn prompt(&self, state: &RoutingState) -> String {
        let roster = state
            .roster
            .iter()
            .map(|agent| {
                let mut line = format!("- {}", agent.name);
                if !agent.description.is_empty() {
                    line.push_str(&format!(": {}", agent.description));
                }
                if !agent.tools.is_empty() {
                    line.push_str(&format!(" (tools: {})", agent.tools.join(", ")));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n");
        let vars = PromptVars::new()
            .with("roster", roster)
            .with("conversation", render_transcript(&state.view))
            .with("last_agent", state.last_agent.as_deref().unwrap_or("none"));
        self.renderer.render(TemplateId::Router, &vars)
    }
}

#[async_trait]
impl Router for ModelRouter {
    async fn decide(&self, state: &RoutingState) -> Result<RouterDecision, RoutingError> {
        let prompt = self.prompt(state);
        let completion = self
            .model
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| RoutingError::RouterFailed(e.to_string()))?;
        *self.last_reply.lock() = Some(completion.text.clone());
        let decision = parse_agent_choice(&completion.text, state)
            .with_usage(self.model.model_name(), completion.usage);
        debug!("Model router chose {:?}", decision.next_agent);
        Ok(decision)
    }
}

/// Interpret a router reply. A roster name (case-insensitive) selects that
/// agent; `STOP`, `none`, `done` or an empty reply stops. Anything else is
/// passed through so the pool reports it as an unknown agent.
pub fn parse_agent_choice(reply: &str, state: &RoutingState) -> RouterDecision {
    let choice = reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
        .trim();

    if choice.is_empty() || ["stop", "none", "done"].contains(&choice.to_lowercase().as_str()) {
        return RouterDecision::stop();
    }
    match state
        .roster
        .iter()
        .find(|agent| agent.name.eq_ignore_ascii_case(choice))
    {
        Some(agent) => RouterDecision::next(agent.name.clone()),
        None => RouterDecision::next(choice),
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
