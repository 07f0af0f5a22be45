//! Prompt rendering.
//!
//! Prompt text is produced by a pure `render(template, variables)` function.
//! [`TemplateRenderer`] ships the built-in templates and substitutes
//! `{{name}}` placeholders; callers may override any template text.

use std::collections::HashMap;

/// Built-in prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// Tool usage instructions for agents with tools.
    Tools,
    /// Instructions for agents without tools.
    NoTools,
    /// Structured output instructions.
    OutputFormat,
    /// First model call of a turn.
    Turn,
    /// Model call after tool execution.
    FollowUp,
    /// Re-prompt after a structured answer failed validation.
    SchemaRetry,
    /// Context summarization.
    Summarize,
    /// Model-backed routing decision.
    Router,
}

impl TemplateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Tools => "tools",
            TemplateId::NoTools => "no_tools",
            TemplateId::OutputFormat => "output_format",
            TemplateId::Turn => "turn",
            TemplateId::FollowUp => "follow_up",
            TemplateId::SchemaRetry => "schema_retry",
            TemplateId::Summarize => "summarize",
            TemplateId::Router => "router",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            TemplateId::Tools => TOOLS_TEMPLATE,
            TemplateId::NoTools => NO_TOOLS_TEMPLATE,
            TemplateId::OutputFormat => OUTPUT_FORMAT_TEMPLATE,
            TemplateId::Turn => TURN_TEMPLATE,
            TemplateId::FollowUp => FOLLOW_UP_TEMPLATE,
            TemplateId::SchemaRetry => SCHEMA_RETRY_TEMPLATE,
            TemplateId::Summarize => SUMMARIZE_TEMPLATE,
            TemplateId::Router => ROUTER_TEMPLATE,
        }
    }
}

const TOOLS_TEMPLATE: &str = "You have access to the following tools:\n{{tools}}\n\n\
To use a tool, respond with ONLY a JSON object of the form \
{\"tool\": \"<tool name>\", \"args\": {<arguments>}} and no other text. \
To call several tools at once, respond with ONLY a JSON array of such objects. \
When you have enough information, give your final answer in plain language, not as JSON.";

const NO_TOOLS_TEMPLATE: &str =
    "Respond directly in natural language. Do not output JSON tool calls.";

const OUTPUT_FORMAT_TEMPLATE: &str =
    "Your final answer must be a single JSON document matching this schema:\n{{schema}}";

const TURN_TEMPLATE: &str = "{{persona}}\n\n{{instructions}}\n\n{{conversation}}{{router_instructions}}\n\nAssistant:";

const FOLLOW_UP_TEMPLATE: &str = "{{persona}}\n\n{{instructions}}\n\n{{conversation}}{{router_instructions}}\n\n\
Tool activity in this turn:\n{{tool_results}}\n\n\
Use the tool results above. Call another tool if you still need information, \
otherwise give your final answer.\n\nAssistant:";

const SCHEMA_RETRY_TEMPLATE: &str = "{{persona}}\n\n{{instructions}}\n\n\
{{conversation}}{{router_instructions}}{{tool_activity}}\n\n\
Your previous answer was:\n{{previous_answer}}\n\n\
It does not satisfy the required JSON schema: {{validation_error}}\n\n\
Respond again with ONLY a JSON document matching this schema:\n{{schema}}\n\nAssistant:";

const SUMMARIZE_TEMPLATE: &str = "Summarize the following conversation concisely. \
Keep facts, decisions and open questions needed to continue it.\n\n{{conversation}}\n\nSummary:";

const ROUTER_TEMPLATE: &str = "You coordinate a team of agents working on one task.\n\n\
Agents:\n{{roster}}\n\n\
Conversation so far:\n{{conversation}}\n\n\
The last agent to act was: {{last_agent}}. \
Avoid choosing the same agent twice in a row unless it is clearly required.\n\n\
Reply with ONLY the name of the agent that should act next, or STOP if the task is complete.";

/// Variables substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: HashMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Pure template rendering.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, template: TemplateId, vars: &PromptVars) -> String;
}

/// Renderer over the built-in templates with optional overrides.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    overrides: HashMap<TemplateId, String>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the text of one template.
    pub fn with_template(mut self, template: TemplateId, text: impl Into<String>) -> Self {
        self.overrides.insert(template, text.into());
        self
    }
}

impl PromptRenderer for TemplateRenderer {
    fn render(&self, template: TemplateId, vars: &PromptVars) -> String {
        let text = self
            .overrides
            .get(&template)
            .map(String::as_str)
            .unwrap_or_else(|| template.builtin());
        substitute(text, vars)
    }
}

/// Replace `{{key}}` placeholders. Unknown placeholders render as empty text.
fn substitute(template: &str, vars: &PromptVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                out.push_str(vars.get(key).unwrap_or(""));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
