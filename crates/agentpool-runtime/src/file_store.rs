//! File-backed history store: one JSON document per thread.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use agentpool_protocols::store::monotonic_after;
use agentpool_protocols::{HistoryStore, HistoryStoreError, Message, Metadata, ThreadId, ThreadInfo};

#[derive(Debug, Serialize, Deserialize)]
struct ThreadDocument {
    id: ThreadId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    messages: Vec<Message>,
}

impl ThreadDocument {
    fn new(id: &str, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            metadata,
            messages: Vec::new(),
        }
    }
}

/// History store writing each thread to `<directory>/<thread id>.json`.
///
/// Writes go to a temporary file that is renamed over the thread file, so
/// readers never observe a partially written thread.
pub struct FileHistoryStore {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn thread_path(&self, id: &str) -> Result<PathBuf, HistoryStoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(HistoryStoreError::Storage(format!("invalid thread id: {:?}", id)));
        }
        Ok(self.directory.join(format!("{}.json", id)))
    }

    async fn load(&self, id: &str) -> Result<Option<ThreadDocument>, HistoryStoreError> {
        let path = self.thread_path(id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn save(&self, doc: &ThreadDocument) -> Result<(), HistoryStoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.thread_path(&doc.id)?;
        let tmp = self.directory.join(format!(".{}.json.tmp", doc.id));
        let json = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Saved thread {} ({} messages)", doc.id, doc.messages.len());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    fn id(&self) -> &str {
        "file"
    }

    async fn create_thread(&self, metadata: Metadata) -> Result<ThreadId, HistoryStoreError> {
        let id = Uuid::new_v4().to_string();
        let _guard = self.write_lock.lock().await;
        self.save(&ThreadDocument::new(&id, metadata)).await?;
        Ok(id)
    }

    async fn get(&self, thread: &ThreadId) -> Result<Vec<Message>, HistoryStoreError> {
        Ok(self
            .load(thread)
            .await?
            .map(|doc| doc.messages)
            .unwrap_or_default())
    }

    async fn append(&self, thread: &ThreadId, message: Message) -> Result<(), HistoryStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self
            .load(thread)
            .await?
            .unwrap_or_else(|| ThreadDocument::new(thread, Metadata::new()));
        let message = monotonic_after(doc.messages.last(), message);
        doc.messages.push(message);
        doc.updated_at = Utc::now();
        self.save(&doc).await
    }

    async fn replace(
        &self,
        thread: &ThreadId,
        messages: Vec<Message>,
    ) -> Result<(), HistoryStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self
            .load(thread)
            .await?
            .unwrap_or_else(|| ThreadDocument::new(thread, Metadata::new()));
        doc.messages = messages;
        doc.updated_at = Utc::now();
        self.save(&doc).await
    }

    async fn list_threads(&self) -> Result<Vec<ThreadInfo>, HistoryStoreError> {
        if !tokio::fs::try_exists(&self.directory).await? {
            return Ok(Vec::new());
        }

        let mut infos = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if id.starts_with('.') {
                continue;
            }
            if let Some(doc) = self.load(id).await? {
                infos.push(ThreadInfo {
                    id: doc.id,
                    created_at: doc.created_at,
                    updated_at: doc.updated_at,
                    message_count: doc.messages.len(),
                    metadata: doc.metadata,
                });
            }
        }
        infos.sort_by_key(|i| i.created_at);
        Ok(infos)
    }

    async fn delete_thread(&self, thread: &ThreadId) -> Result<bool, HistoryStoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.thread_path(thread)?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        tokio::fs::remove_file(&path).await?;
        debug!("Deleted thread file: {:?}", path);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileHistoryStore) {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path().join("threads"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_append_then_get() {
        let (_dir, store) = store();
        let thread = store.create_thread(Metadata::new()).await.unwrap();

        store.append(&thread, Message::user("question")).await.unwrap();
        let answer = Message::assistant("answer").with_agent("writer");
        store.append(&thread, answer.clone()).await.unwrap();

        let messages = store.get(&thread).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.last().unwrap(), &answer);
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let thread = {
            let store = FileHistoryStore::new(dir.path());
            let thread = store.create_thread(Metadata::new()).await.unwrap();
            store.append(&thread, Message::user("kept")).await.unwrap();
            thread
        };

        let reopened = FileHistoryStore::new(dir.path());
        let messages = reopened.get(&thread).await.unwrap();
        assert_eq!(messages[0].content, "kept");
    }

    #[tokio::test]
    async fn test_replace_and_list() {
        let (_dir, store) = store();
        let thread = store.create_thread(Metadata::new()).await.unwrap();
        for i in 0..5 {
            store.append(&thread, Message::user(format!("m{}", i))).await.unwrap();
        }
        store
            .replace(&thread, vec![Message::system("summary")])
            .await
            .unwrap();

        let threads = store.list_threads().await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].id, thread);
        assert_eq!(threads[0].message_count, 1);
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list_threads().await.unwrap().is_empty());
        assert!(store.get(&"absent".to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, store) = store();
        let thread = store.create_thread(Metadata::new()).await.unwrap();
        assert!(store.delete_thread(&thread).await.unwrap());
        assert!(!store.delete_thread(&thread).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_dir, store) = store();
        let err = store
            .append(&"../escape".to_string(), Message::user("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryStoreError::Storage(_)));
    }
}
