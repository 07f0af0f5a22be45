//! Agent specification and context policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::provider::ModelProvider;
use crate::router::AgentProfile;
use crate::tool::Tool;

/// How an over-long thread is bounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStrategy {
    /// Keep the most recent `max_messages`.
    TrimLast,
    /// Keep the oldest `max_messages`.
    TrimFirst,
    /// Replace an old prefix with a model-written summary.
    Summarize,
    /// Summarize when the excess is large enough, otherwise trim.
    #[default]
    Smart,
}

impl std::str::FromStr for ContextStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trim_last" => Ok(Self::TrimLast),
            "trim_first" => Ok(Self::TrimFirst),
            "summarize" => Ok(Self::Summarize),
            "smart" => Ok(Self::Smart),
            other => Err(format!("unknown context strategy: {}", other)),
        }
    }
}

/// Bounds applied to the conversation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPolicy {
    pub max_messages: usize,
    pub strategy: ContextStrategy,
    /// Minimum excess (`len - max_messages`) at which `smart` summarizes.
    pub smart_threshold: usize,
    /// Recent messages kept verbatim when summarizing. 0 keeps as many as fit.
    pub keep_recent: usize,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self {
            max_messages: 20,
            strategy: ContextStrategy::Smart,
            smart_threshold: 4,
            keep_recent: 0,
        }
    }
}

impl ContextPolicy {
    pub fn new(max_messages: usize, strategy: ContextStrategy) -> Self {
        Self {
            max_messages: max_messages.max(1),
            strategy,
            ..Default::default()
        }
    }

    pub fn with_smart_threshold(mut self, threshold: usize) -> Self {
        self.smart_threshold = threshold;
        self
    }

    pub fn with_keep_recent(mut self, keep_recent: usize) -> Self {
        self.keep_recent = keep_recent;
        self
    }
}

/// What to do when the final answer fails the agent's output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SchemaFailurePolicy {
    /// Re-prompt with the validation error, up to `max_attempts` answers in total.
    Retry { max_attempts: u32 },
    /// Fail on the first invalid answer.
    Fail,
}

impl Default for SchemaFailurePolicy {
    fn default() -> Self {
        SchemaFailurePolicy::Retry { max_attempts: 3 }
    }
}

impl SchemaFailurePolicy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            SchemaFailurePolicy::Retry { max_attempts } => (*max_attempts).max(1),
            SchemaFailurePolicy::Fail => 1,
        }
    }
}

/// Immutable description of an agent.
#[derive(Clone)]
pub struct AgentSpec {
    /// Unique name within a pool.
    pub name: String,
    pub description: String,
    pub persona: String,
    pub tools: Vec<Arc<dyn Tool>>,
    pub output_schema: Option<serde_json::Value>,
    pub schema_failure: SchemaFailurePolicy,
    pub context_policy: ContextPolicy,
    /// Model used for turns. A pool fills this from its default model when absent.
    pub model: Option<Arc<dyn ModelProvider>>,
    /// Dedicated model for context summarization.
    pub summarize_model: Option<Arc<dyn ModelProvider>>,
    /// Request streaming completions.
    pub stream: bool,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            persona: persona.into(),
            tools: Vec::new(),
            output_schema: None,
            schema_failure: SchemaFailurePolicy::default(),
            context_policy: ContextPolicy::default(),
            model: None,
            summarize_model: None,
            stream: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_schema_failure(mut self, policy: SchemaFailurePolicy) -> Self {
        self.schema_failure = policy;
        self
    }

    pub fn with_context_policy(mut self, policy: ContextPolicy) -> Self {
        self.context_policy = policy;
        self
    }

    pub fn with_model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_summarize_model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        self.summarize_model = Some(model);
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.spec().name == name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.spec().name.clone()).collect()
    }

    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            name: self.name.clone(),
            description: self.description.clone(),
            tools: self.tool_names(),
        }
    }
}

impl fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSpec")
            .field("name", &self.name)
            .field("tools", &self.tool_names())
            .field("output_schema", &self.output_schema.is_some())
            .field("context_policy", &self.context_policy)
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_policy_default() {
        let policy = ContextPolicy::default();
        assert_eq!(policy.max_messages, 20);
        assert_eq!(policy.strategy, ContextStrategy::Smart);
    }

    #[test]
    fn test_context_policy_min_one_message() {
        let policy = ContextPolicy::new(0, ContextStrategy::TrimLast);
        assert_eq!(policy.max_messages, 1);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("trim_last".parse::<ContextStrategy>().unwrap(), ContextStrategy::TrimLast);
        assert_eq!("summarize".parse::<ContextStrategy>().unwrap(), ContextStrategy::Summarize);
        assert!("drop_all".parse::<ContextStrategy>().is_err());
    }

    #[test]
    fn test_schema_failure_attempts() {
        assert_eq!(SchemaFailurePolicy::Fail.max_attempts(), 1);
        assert_eq!(SchemaFailurePolicy::Retry { max_attempts: 0 }.max_attempts(), 1);
        assert_eq!(SchemaFailurePolicy::Retry { max_attempts: 4 }.max_attempts(), 4);
    }

    #[test]
    fn test_agent_spec_profile() {
        let spec = AgentSpec::new("collector", "You collect facts.")
            .with_description("Gathers information");
        let profile = spec.profile();
        assert_eq!(profile.name, "collector");
        assert_eq!(profile.description, "Gathers information");
        assert!(profile.tools.is_empty());
        assert!(!spec.has_tools());
    }
}
