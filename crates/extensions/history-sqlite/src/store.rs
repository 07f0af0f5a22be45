//! SQLite history store implementation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;
use tracing::debug;

use agentpool_protocols::{
    HistoryStore, HistoryStoreError, Message, Metadata, Role, ThreadId, ThreadInfo,
};

use crate::schema::init_schema;

/// Message row as stored, before decoding.
struct MessageRow {
    id: String,
    role: String,
    content: String,
    agent: Option<String>,
    timestamp: String,
    metadata: String,
}

struct ThreadRow {
    id: String,
    created_at: String,
    updated_at: String,
    metadata: String,
    message_count: i64,
}

/// SQLite-based history store.
pub struct SqliteHistoryStore {
    conn: Connection,
}

impl SqliteHistoryStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, HistoryStoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| HistoryStoreError::Connection(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open or create a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HistoryStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = Connection::open(path)
            .await
            .map_err(|e| HistoryStoreError::Connection(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, HistoryStoreError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(storage)?;
        Ok(Self { conn })
    }
}

fn storage(e: tokio_rusqlite::Error) -> HistoryStoreError {
    HistoryStoreError::Storage(e.to_string())
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, HistoryStoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HistoryStoreError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

fn parse_metadata(value: &str) -> Result<Metadata, HistoryStoreError> {
    if value.is_empty() {
        return Ok(Metadata::new());
    }
    Ok(serde_json::from_str(value)?)
}

impl MessageRow {
    fn decode(self) -> Result<Message, HistoryStoreError> {
        let role: Role = self.role.parse().map_err(HistoryStoreError::Serialization)?;
        Ok(Message {
            id: self.id,
            role,
            content: self.content,
            agent: self.agent,
            timestamp: parse_time(&self.timestamp)?,
            metadata: parse_metadata(&self.metadata)?,
        })
    }
}

impl ThreadRow {
    fn decode(self) -> Result<ThreadInfo, HistoryStoreError> {
        Ok(ThreadInfo {
            id: self.id,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
            message_count: self.message_count.max(0) as usize,
            metadata: parse_metadata(&self.metadata)?,
        })
    }
}

const ENSURE_THREAD: &str =
    "INSERT OR IGNORE INTO threads (id, created_at, updated_at, metadata) VALUES (?1, ?2, ?2, '{}')";

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    fn id(&self) -> &str {
        "sqlite"
    }

    async fn create_thread(&self, metadata: Metadata) -> Result<ThreadId, HistoryStoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_time(&Utc::now());
        let metadata = serde_json::to_string(&metadata)?;

        let id_clone = id.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO threads (id, created_at, updated_at, metadata) VALUES (?1, ?2, ?2, ?3)",
                    params![id_clone, now, metadata],
                )?;
                Ok(())
            })
            .await
            .map_err(storage)?;
        Ok(id)
    }

    async fn get(&self, thread: &ThreadId) -> Result<Vec<Message>, HistoryStoreError> {
        let thread = thread.clone();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, role, content, agent, timestamp, metadata
                     FROM messages WHERE thread_id = ?1 ORDER BY seq",
                )?;
                let rows = stmt
                    .query_map([&thread], |row| {
                        Ok(MessageRow {
                            id: row.get(0)?,
                            role: row.get(1)?,
                            content: row.get(2)?,
                            agent: row.get(3)?,
                            timestamp: row.get(4)?,
                            metadata: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage)?;

        rows.into_iter().map(MessageRow::decode).collect()
    }

    async fn append(&self, thread: &ThreadId, message: Message) -> Result<(), HistoryStoreError> {
        let thread = thread.clone();
        let metadata = serde_json::to_string(&message.metadata)?;
        let now = format_time(&Utc::now());

        let timestamp = format_time(&message.timestamp);

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(ENSURE_THREAD, params![thread, now])?;
                let last: Option<(i64, String)> = tx
                    .query_row(
                        "SELECT seq, timestamp FROM messages WHERE thread_id = ?1 ORDER BY seq DESC LIMIT 1",
                        [&thread],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                // Fixed-width UTC timestamps compare lexically.
                let (seq, timestamp) = match last {
                    Some((seq, last_ts)) if last_ts > timestamp => (seq + 1, last_ts),
                    Some((seq, _)) => (seq + 1, timestamp),
                    None => (1, timestamp),
                };
                tx.execute(
                    "INSERT INTO messages (thread_id, seq, id, role, content, agent, timestamp, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        thread,
                        seq,
                        message.id,
                        message.role.as_str(),
                        message.content,
                        message.agent,
                        timestamp,
                        metadata
                    ],
                )?;
                tx.execute(
                    "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
                    params![now, thread],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(storage)
    }

    async fn replace(
        &self,
        thread: &ThreadId,
        messages: Vec<Message>,
    ) -> Result<(), HistoryStoreError> {
        let thread = thread.clone();
        let now = format_time(&Utc::now());
        let rows = messages
            .into_iter()
            .map(|m| {
                Ok((
                    m.id,
                    m.role.as_str(),
                    m.content,
                    m.agent,
                    format_time(&m.timestamp),
                    serde_json::to_string(&m.metadata)?,
                ))
            })
            .collect::<Result<Vec<_>, HistoryStoreError>>()?;
        let count = rows.len();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(ENSURE_THREAD, params![thread, now])?;
                tx.execute("DELETE FROM messages WHERE thread_id = ?1", [&thread])?;
                for (seq, (id, role, content, agent, timestamp, metadata)) in rows.into_iter().enumerate() {
                    tx.execute(
                        "INSERT INTO messages (thread_id, seq, id, role, content, agent, timestamp, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![thread, seq as i64 + 1, id, role, content, agent, timestamp, metadata],
                    )?;
                }
                tx.execute(
                    "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
                    params![now, thread],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(storage)?;

        debug!("Replaced thread with {} messages", count);
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<ThreadInfo>, HistoryStoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.id, t.created_at, t.updated_at, t.metadata,
                            (SELECT COUNT(*) FROM messages m WHERE m.thread_id = t.id)
                     FROM threads t ORDER BY t.created_at",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(ThreadRow {
                            id: row.get(0)?,
                            created_at: row.get(1)?,
                            updated_at: row.get(2)?,
                            metadata: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                            message_count: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage)?;

        rows.into_iter().map(ThreadRow::decode).collect()
    }

    async fn delete_thread(&self, thread: &ThreadId) -> Result<bool, HistoryStoreError> {
        let thread = thread.clone();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM messages WHERE thread_id = ?1", [&thread])?;
                let deleted = tx.execute("DELETE FROM threads WHERE id = ?1", [&thread])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(storage)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
