//! Model capability.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::ModelError;
use crate::types::Usage;

/// Options passed with a completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stop: Vec<String>,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Result of a completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

impl Completion {
    pub fn new(text: impl Into<String>, usage: Usage) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }
}

/// Event produced by a streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of generated text.
    Delta(String),
    /// Terminal event carrying token counts.
    Done(Usage),
}

/// Lazy, finite, non-restartable sequence of stream events.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ModelError>> + Send>>;

/// Opaque completion capability: prompt text in, completion and token counts out.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Model name, used for pricing and trace attribution.
    fn model_name(&self) -> &str;

    /// Generate a completion.
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, ModelError>;

    /// Generate a streaming completion.
    ///
    /// The default implementation wraps [`ModelProvider::complete`] into a
    /// single delta followed by the terminal event.
    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionStream, ModelError> {
        let completion = self.complete(prompt, options).await?;
        let events = vec![
            Ok(StreamEvent::Delta(completion.text)),
            Ok(StreamEvent::Done(completion.usage)),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct FixedModel;

    #[async_trait]
    impl ModelProvider for FixedModel {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<Completion, ModelError> {
            Ok(Completion::new("hello", Usage::new(3, 1)))
        }
    }

    #[tokio::test]
    async fn test_default_stream_wraps_completion() {
        let model = FixedModel;
        let mut stream = model
            .complete_stream("hi", &CompletionOptions::default())
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, StreamEvent::Delta("hello".to_string()));
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second, StreamEvent::Done(Usage::new(3, 1)));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_options_builder() {
        let opts = CompletionOptions::default()
            .with_temperature(0.2)
            .with_max_tokens(256);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(256));
    }
}
