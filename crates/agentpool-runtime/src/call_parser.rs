//! Classification of model responses into tool calls or final answers.
//!
//! A response is a tool call only when the whole trimmed text is exactly one
//! call descriptor, or a JSON array of descriptors:
//!
//! ```text
//! {"tool": "search", "args": {"query": "rust"}}
//! [{"tool": "a", "args": {}}, {"tool": "b", "args": {"x": 1}}]
//! ```
//!
//! Anything else (surrounding prose, code fences, extra keys, non-object
//! arguments, an empty array) is a final answer.

use serde::Deserialize;
use serde_json::{Map, Value};

use agentpool_protocols::ToolCall;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CallDescriptor {
    tool: String,
    args: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Descriptors {
    One(CallDescriptor),
    Many(Vec<CallDescriptor>),
}

/// Classified model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    ToolCalls(Vec<ToolCall>),
    Final(String),
}

impl ModelReply {
    pub fn is_tool_call(&self) -> bool {
        matches!(self, ModelReply::ToolCalls(_))
    }
}

/// Classify a raw model response.
pub fn parse_reply(text: &str) -> ModelReply {
    match parse_descriptors(text.trim()) {
        Some(calls) => ModelReply::ToolCalls(calls),
        None => ModelReply::Final(text.to_string()),
    }
}

fn parse_descriptors(text: &str) -> Option<Vec<ToolCall>> {
    if !(text.starts_with('{') || text.starts_with('[')) {
        return None;
    }
    let descriptors = match serde_json::from_str::<Descriptors>(text).ok()? {
        Descriptors::One(d) => vec![d],
        Descriptors::Many(list) => list,
    };
    if descriptors.is_empty() || descriptors.iter().any(|d| d.tool.trim().is_empty()) {
        return None;
    }
    Some(
        descriptors
            .into_iter()
            .map(|d| ToolCall::new(d.tool, Value::Object(d.args)))
            .collect(),
    )
}
