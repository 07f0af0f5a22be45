//! Thread access and bounded context views.

use std::sync::Arc;

use tracing::{debug, warn};

use agentpool_protocols::{
    AgentError, AgentSpec, ContextPolicy, ContextStrategy, HistoryStore, HistoryStoreError,
    Message, SUMMARY_METADATA_KEY, SpanKind, SpanStatus, ThreadId, Usage,
};

use crate::prompt::{PromptRenderer, TemplateRenderer};
use crate::summarizer::{ModelSummarizer, Summarizer};
use crate::trace::TraceContext;

/// Prefix of the synthetic message that replaces a summarized prefix.
pub const SUMMARY_PREFIX: &str = "[Conversation summary]";

/// What `view` did to the thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextAction {
    /// The thread already fit.
    Unchanged,
    /// Messages were left out of the view. The stored thread is untouched.
    Trimmed { dropped: usize },
    /// A prefix was replaced by a summary and the thread was rewritten.
    Summarized {
        summarized: usize,
        usage: Usage,
        cost: f64,
    },
}

/// Bounded conversation view handed to prompt building and routers.
#[derive(Debug, Clone)]
pub struct ContextView {
    pub messages: Vec<Message>,
    pub action: ContextAction,
}

impl ContextView {
    fn unchanged(messages: Vec<Message>) -> Self {
        Self {
            messages,
            action: ContextAction::Unchanged,
        }
    }
}

/// Reads and writes threads through a [`HistoryStore`] and bounds what a
/// turn gets to see.
#[derive(Clone)]
pub struct ContextManager {
    store: Arc<dyn HistoryStore>,
    renderer: Arc<dyn PromptRenderer>,
}

impl ContextManager {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            renderer: Arc::new(TemplateRenderer::new()),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub async fn append(&self, thread: &ThreadId, message: Message) -> Result<(), HistoryStoreError> {
        self.store.append(thread, message).await
    }

    pub async fn get(&self, thread: &ThreadId) -> Result<Vec<Message>, HistoryStoreError> {
        self.store.get(thread).await
    }

    /// Summarizer for an agent: its dedicated summarize model, else its turn model.
    pub fn summarizer_for(&self, agent: &AgentSpec) -> Option<Arc<dyn Summarizer>> {
        let model = agent.summarize_model.as_ref().or(agent.model.as_ref())?;
        Some(Arc::new(
            ModelSummarizer::new(model.clone()).with_renderer(self.renderer.clone()),
        ))
    }

    /// Bounded view of a thread under `policy`.
    ///
    /// Trimming never touches the stored thread. Summarizing rewrites it so the
    /// summary replaces the prefix for every later reader. If no summarizer is
    /// available or summarization fails, the view falls back to the most
    /// recent messages.
    pub async fn view(
        &self,
        thread: &ThreadId,
        policy: &ContextPolicy,
        summarizer: Option<&dyn Summarizer>,
        trace: &TraceContext,
    ) -> Result<ContextView, AgentError> {
        let messages = self.store.get(thread).await?;
        let max = policy.max_messages.max(1);
        if messages.len() <= max {
            return Ok(ContextView::unchanged(messages));
        }

        let excess = messages.len() - max;
        let summarize = match policy.strategy {
            ContextStrategy::TrimLast | ContextStrategy::TrimFirst => false,
            ContextStrategy::Summarize => true,
            ContextStrategy::Smart => excess >= policy.smart_threshold,
        };
        if !summarize {
            return Ok(trimmed(&messages, policy));
        }
        if max < 2 {
            debug!("Window of {} leaves no room for a summary, trimming instead", max);
            return Ok(trimmed(&messages, &policy_trim_last(policy)));
        }

        let Some(summarizer) = summarizer else {
            warn!("No summarizer available for thread {}, trimming instead", thread);
            return Ok(trimmed(&messages, &policy_trim_last(policy)));
        };
        self.summarize(thread, messages, policy, summarizer, trace).await
    }

    async fn summarize(
        &self,
        thread: &ThreadId,
        messages: Vec<Message>,
        policy: &ContextPolicy,
        summarizer: &dyn Summarizer,
        trace: &TraceContext,
    ) -> Result<ContextView, AgentError> {
        let max = policy.max_messages.max(1);
        let tail_len = if policy.keep_recent == 0 {
            max - 1
        } else {
            policy.keep_recent.min(max - 1)
        };
        let split = messages.len() - tail_len;
        let (prefix, tail) = messages.split_at(split);

        let mut span = trace.start_span(SpanKind::Summarize, "summarize").await;
        let completion = match summarizer.summarize(prefix).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Summarization failed for thread {}: {}, trimming instead", thread, e);
                span.finish(SpanStatus::Error(e.to_string())).await;
                return Ok(trimmed(&messages, &policy_trim_last(policy)));
            }
        };
        span.add_model_usage(summarizer.model_name(), completion.usage);
        let record = span.finish(SpanStatus::Ok).await;

        let mut summary = Message::system(format!("{} {}", SUMMARY_PREFIX, completion.text.trim()))
            .with_metadata(SUMMARY_METADATA_KEY, serde_json::Value::Bool(true));
        if let Some(last) = prefix.last() {
            summary = summary.with_timestamp(last.timestamp);
        }

        let mut rewritten = Vec::with_capacity(tail.len() + 1);
        rewritten.push(summary);
        rewritten.extend_from_slice(tail);
        self.store.replace(thread, rewritten.clone()).await?;

        debug!(
            "Summarized {} messages of thread {} ({} kept)",
            prefix.len(),
            thread,
            tail.len()
        );
        Ok(ContextView {
            messages: rewritten,
            action: ContextAction::Summarized {
                summarized: prefix.len(),
                usage: record.usage,
                cost: record.cost,
            },
        })
    }
}

/// Pure trim of `messages` to `policy.max_messages`.
///
/// `trim_first` keeps the oldest messages; every other strategy keeps the
/// most recent ones.
pub fn trim_view(messages: &[Message], policy: &ContextPolicy) -> Vec<Message> {
    let max = policy.max_messages.max(1);
    if messages.len() <= max {
        return messages.to_vec();
    }
    match policy.strategy {
        ContextStrategy::TrimFirst => messages[..max].to_vec(),
        _ => messages[messages.len() - max..].to_vec(),
    }
}

fn trimmed(messages: &[Message], policy: &ContextPolicy) -> ContextView {
    let view = trim_view(messages, policy);
    ContextView {
        action: ContextAction::Trimmed {
            dropped: messages.len() - view.len(),
        },
        messages: view,
    }
}

fn policy_trim_last(policy: &ContextPolicy) -> ContextPolicy {
    ContextPolicy {
        strategy: ContextStrategy::TrimLast,
        ..*policy
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
