//! In-memory history store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use agentpool_protocols::store::monotonic_after;
use agentpool_protocols::{HistoryStore, HistoryStoreError, Message, Metadata, ThreadId, ThreadInfo};

#[derive(Debug, Clone)]
struct StoredThread {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    metadata: Metadata,
    messages: Vec<Message>,
}

impl StoredThread {
    fn new(metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            metadata,
            messages: Vec::new(),
        }
    }

    fn info(&self, id: &str) -> ThreadInfo {
        ThreadInfo {
            id: id.to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
            metadata: self.metadata.clone(),
        }
    }
}

/// History store kept in process memory.
pub struct MemoryHistoryStore {
    threads: RwLock<HashMap<ThreadId, StoredThread>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn create_thread(&self, metadata: Metadata) -> Result<ThreadId, HistoryStoreError> {
        let id = Uuid::new_v4().to_string();
        self.threads
            .write()
            .await
            .insert(id.clone(), StoredThread::new(metadata));
        Ok(id)
    }

    async fn get(&self, thread: &ThreadId) -> Result<Vec<Message>, HistoryStoreError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread)
            .map(|t| t.messages.clone())
            .unwrap_or_default())
    }

    async fn append(&self, thread: &ThreadId, message: Message) -> Result<(), HistoryStoreError> {
        let mut threads = self.threads.write().await;
        let stored = threads
            .entry(thread.clone())
            .or_insert_with(|| StoredThread::new(Metadata::new()));
        let message = monotonic_after(stored.messages.last(), message);
        stored.messages.push(message);
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn replace(
        &self,
        thread: &ThreadId,
        messages: Vec<Message>,
    ) -> Result<(), HistoryStoreError> {
        let mut threads = self.threads.write().await;
        let stored = threads
            .entry(thread.clone())
            .or_insert_with(|| StoredThread::new(Metadata::new()));
        stored.messages = messages;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<ThreadInfo>, HistoryStoreError> {
        let threads = self.threads.read().await;
        let mut infos: Vec<ThreadInfo> = threads.iter().map(|(id, t)| t.info(id)).collect();
        infos.sort_by_key(|i| i.created_at);
        Ok(infos)
    }

    async fn delete_thread(&self, thread: &ThreadId) -> Result<bool, HistoryStoreError> {
        Ok(self.threads.write().await.remove(thread).is_some())
    }
}
