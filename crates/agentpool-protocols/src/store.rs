//! Pluggable thread persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HistoryStoreError;
use crate::types::{Message, Metadata, ThreadId};

/// Summary of a stored thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Storage interface for threads.
///
/// Backends must make `append` atomic per thread: a concurrent reader sees the
/// thread either before or after the message, never a partial write. Getting or
/// appending to an unknown thread id behaves as if the thread were empty.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Backend identifier.
    fn id(&self) -> &str;

    /// Create an empty thread and return its id.
    async fn create_thread(&self, metadata: Metadata) -> Result<ThreadId, HistoryStoreError>;

    /// Ordered messages of a thread.
    async fn get(&self, thread: &ThreadId) -> Result<Vec<Message>, HistoryStoreError>;

    /// Append one message to the end of a thread.
    async fn append(&self, thread: &ThreadId, message: Message) -> Result<(), HistoryStoreError>;

    /// Replace the whole message sequence of a thread.
    async fn replace(
        &self,
        thread: &ThreadId,
        messages: Vec<Message>,
    ) -> Result<(), HistoryStoreError>;

    /// List known threads.
    async fn list_threads(&self) -> Result<Vec<ThreadInfo>, HistoryStoreError>;

    /// Delete a thread. Returns false if it did not exist.
    async fn delete_thread(&self, thread: &ThreadId) -> Result<bool, HistoryStoreError>;
}

/// Clamp a message timestamp so a thread stays time-monotonic.
pub fn monotonic_after(last: Option<&Message>, mut message: Message) -> Message {
    if let Some(last) = last {
        if message.timestamp < last.timestamp {
            message.timestamp = last.timestamp;
        }
    }
    message
}
