//! Router interface for multi-agent pools.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RoutingError;
use crate::types::{Message, Usage};

/// Which agent acts next. `next_agent = None` stops the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub next_agent: Option<String>,
    #[serde(default)]
    pub instructions: String,
    /// Model tokens spent reaching the decision, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<RouterUsage>,
}

/// Completion usage of a model-backed routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterUsage {
    pub model: String,
    pub usage: Usage,
}

impl RouterDecision {
    pub fn next(agent: impl Into<String>) -> Self {
        Self {
            next_agent: Some(agent.into()),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_usage(mut self, model: impl Into<String>, usage: Usage) -> Self {
        self.usage = Some(RouterUsage {
            model: model.into(),
            usage,
        });
        self
    }

    pub fn is_stop(&self) -> bool {
        self.next_agent.is_none()
    }
}

/// Roster entry describing an agent to a router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
}

/// Outcome of the most recent agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastResult {
    pub agent: String,
    pub output: String,
    pub tools_used: Vec<String>,
}

/// Key/value store shared by every routing decision of one pool run.
#[derive(Debug, Clone, Default)]
pub struct PoolState {
    inner: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl PoolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner.write().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.write().remove(key)
    }

    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.inner.read().clone()
    }
}

impl From<HashMap<String, serde_json::Value>> for PoolState {
    fn from(values: HashMap<String, serde_json::Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(values)),
        }
    }
}

/// Everything a router may look at when deciding.
#[derive(Debug, Clone)]
pub struct RoutingState {
    /// Bounded view of the shared thread.
    pub view: Vec<Message>,
    /// Agents in registration order.
    pub roster: Vec<AgentProfile>,
    pub last_agent: Option<String>,
    pub last_result: Option<LastResult>,
    /// Number of agent turns already executed.
    pub iteration: u32,
    pub max_iter: u32,
    pub state: PoolState,
}

impl RoutingState {
    pub fn has_agent(&self, name: &str) -> bool {
        self.roster.iter().any(|a| a.name == name)
    }
}

/// Single-method decision interface satisfied by built-in and custom routers.
#[async_trait]
pub trait Router: Send + Sync {
    async fn decide(&self, state: &RoutingState) -> Result<RouterDecision, RoutingError>;
}
