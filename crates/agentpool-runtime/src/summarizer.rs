//! Model-backed conversation summarization.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use agentpool_protocols::{
    Completion, CompletionOptions, Message, ModelError, ModelProvider, Usage, render_transcript,
};

use crate::prompt::{PromptRenderer, PromptVars, TemplateId, TemplateRenderer};

/// Produces a summary of a message prefix.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a list of messages.
    async fn summarize(&self, messages: &[Message]) -> Result<Completion, ModelError>;

    /// Model used, for cost attribution.
    fn model_name(&self) -> &str;
}

/// Summarizer that prompts a model with the summarize template.
pub struct ModelSummarizer {
    model: Arc<dyn ModelProvider>,
    renderer: Arc<dyn PromptRenderer>,
    options: CompletionOptions,
}

impl ModelSummarizer {
    pub fn new(model: Arc<dyn ModelProvider>) -> Self {
        Self {
            model,
            renderer: Arc::new(TemplateRenderer::new()),
            options: CompletionOptions::default().with_max_tokens(1024),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Summarizer for ModelSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<Completion, ModelError> {
        if messages.is_empty() {
            return Ok(Completion::new(String::new(), Usage::default()));
        }

        debug!("Summarizing {} messages with {}", messages.len(), self.model.model_name());

        let vars = PromptVars::new().with("conversation", render_transcript(messages));
        let prompt = self.renderer.render(TemplateId::Summarize, &vars);
        let completion = self.model.complete(&prompt, &self.options).await?;
        if completion.text.trim().is_empty() {
            return Err(ModelError::EmptyCompletion);
        }
        Ok(completion)
    }

    fn model_name(&self) -> &str {
        self.model.model_name()
    }
}
