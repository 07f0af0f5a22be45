//! Message types for conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::common::Metadata;

/// A message in a thread. Messages are never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: String,

    /// Role of the message sender.
    pub role: Role,

    /// Text content.
    pub content: String,

    /// Name of the agent that produced the message, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub agent: Option<String>,

    /// Creation time.
    pub timestamp: DateTime<Utc>,

    /// Additional metadata.
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: Metadata,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            agent: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Attribute the message to an agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true for synthetic summary messages produced by context management.
    pub fn is_summary(&self) -> bool {
        self.metadata
            .get(SUMMARY_METADATA_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Render as a single transcript line, e.g. `Assistant (writer): ...`.
    pub fn transcript_line(&self) -> String {
        match &self.agent {
            Some(agent) => format!("{} ({}): {}", self.role.label(), agent, self.content),
            None => format!("{}: {}", self.role.label(), self.content),
        }
    }
}

/// Metadata key marking a summary message.
pub const SUMMARY_METADATA_KEY: &str = "summary";

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Render messages as a newline separated transcript.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
