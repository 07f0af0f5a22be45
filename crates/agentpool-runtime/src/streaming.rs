//! Streaming completions and turn progress events.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use agentpool_protocols::{Completion, CompletionStream, ModelError, StreamEvent, Usage};

/// Progress of an agent turn, delivered to an optional observer.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// An agent turn began.
    TurnStart { agent: String },
    /// Text streamed from the model.
    TextDelta { agent: String, content: String },
    /// A tool call is about to run.
    ToolCallStart {
        agent: String,
        id: String,
        name: String,
    },
    /// A tool call resolved.
    ToolCallComplete {
        agent: String,
        id: String,
        result: String,
    },
    /// The turn produced its final answer.
    TurnComplete { agent: String, output: String },
}

/// Sender half handed to the runtime.
pub type TurnEventSender = mpsc::Sender<TurnEvent>;

/// Stream of turn events.
pub struct TurnEventStream {
    receiver: mpsc::Receiver<TurnEvent>,
}

impl TurnEventStream {
    /// Create a bounded channel and the stream reading from it.
    pub fn channel(buffer: usize) -> (TurnEventSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { receiver: rx })
    }
}

impl Stream for TurnEventStream {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Drain a completion stream into a [`Completion`], passing each delta to
/// `on_delta`. A stream that ends without a `Done` event reports zero usage.
pub async fn collect_stream<F, Fut>(
    mut stream: CompletionStream,
    mut on_delta: F,
) -> Result<Completion, ModelError>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut text = String::new();
    let mut usage = Usage::default();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Delta(chunk) => {
                text.push_str(&chunk);
                on_delta(chunk).await;
            }
            StreamEvent::Done(final_usage) => {
                usage = final_usage;
                break;
            }
        }
    }
    Ok(Completion::new(text, usage))
}
