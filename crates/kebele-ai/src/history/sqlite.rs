//! SQLite-backed chat history.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::ChatHistoryStore;
use crate::error::{AiError, Result};
use crate::types::{
    ChatRecord, ChatSource, HistoryPage, ProcedureRef, normalize_paging, page_offset,
};

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

/// Raw column values: id, user_id, source, request, response, created_at, related.
type RawRecord = (String, String, String, String, String, String, String);

/// Chat history persisted in a SQLite database.
///
/// Uses WAL mode. Queries run on the blocking pool so a slow disk never
/// stalls the async runtime.
#[derive(Clone)]
pub struct SqliteChatHistory {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteChatHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteChatHistory").finish_non_exhaustive()
    }
}

impl SqliteChatHistory {
    /// Open or create a history database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AiError::Storage(format!(
                    "failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        let store = Self::from_connection(conn)?;

        info!(path = %path.display(), "Chat history opened");
        Ok(store)
    }

    /// Create an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if current_version < SCHEMA_VERSION {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS chat_records (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    source TEXT NOT NULL,
                    request TEXT NOT NULL,
                    response TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    related TEXT NOT NULL DEFAULT '[]'
                );

                CREATE INDEX IF NOT EXISTS idx_chat_records_user_created
                    ON chat_records(user_id, created_at);
                "#,
            )?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            debug!(version = SCHEMA_VERSION, "Chat history schema created");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| AiError::Storage(format!("history task failed: {}", e)))?
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn decode(raw: RawRecord) -> Result<ChatRecord> {
        let (id, user_id, source, request, response, created_at, related) = raw;
        let id = Uuid::parse_str(&id)
            .map_err(|e| AiError::Storage(format!("corrupt record id '{}': {}", id, e)))?;
        let source: ChatSource = source.parse().map_err(AiError::Storage)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| AiError::Storage(format!("corrupt timestamp '{}': {}", created_at, e)))?
            .with_timezone(&Utc);
        let related_procedures: Vec<ProcedureRef> = serde_json::from_str(&related)?;

        Ok(ChatRecord {
            id,
            user_id,
            source,
            request,
            response,
            created_at,
            related_procedures,
        })
    }
}

#[async_trait]
impl ChatHistoryStore for SqliteChatHistory {
    async fn save(&self, record: &ChatRecord) -> Result<()> {
        let related = serde_json::to_string(&record.related_procedures)?;
        let record = record.clone();

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO chat_records (id, user_id, source, request, response, created_at, related)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    record.id.to_string(),
                    record.user_id,
                    record.source.as_str(),
                    record.request,
                    record.response,
                    // Fixed-width UTC so text order matches time order
                    record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                    related,
                ],
            )?;
            debug!(record_id = %record.id, user_id = %record.user_id, "Chat record saved");
            Ok(())
        })
        .await
    }

    async fn get_by_user(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<HistoryPage> {
        let (page, limit) = normalize_paging(page, limit);
        let offset = i64::try_from(page_offset(page, limit)).unwrap_or(i64::MAX);
        let user_id = user_id.to_string();

        self.with_conn(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chat_records WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, source, request, response, created_at, related
                FROM chat_records
                WHERE user_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?2 OFFSET ?3
                "#,
            )?;
            let rows = stmt.query_map(
                params![user_id, limit as i64, offset],
                Self::row_to_record,
            )?;

            let mut records = Vec::new();
            for row in rows {
                records.push(Self::decode(row?)?);
            }

            Ok(HistoryPage {
                records,
                total: total as usize,
                page,
                limit,
            })
        })
        .await
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<usize> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM chat_records WHERE user_id = ?1",
                params![user_id],
            )?;
            info!(user_id = %user_id, removed, "Chat history purged");
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Procedure;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_page() {
        let store = SqliteChatHistory::open_in_memory().unwrap();
        let related = vec![Procedure::new("p1", "Procedure1").to_ref()];

        for i in 0..3 {
            let mut record = ChatRecord::new("u1", format!("q{}", i), "a", related.clone());
            record.created_at = Utc::now() + chrono::Duration::seconds(i);
            store.save(&record).await.unwrap();
        }
        store
            .save(&ChatRecord::new("u2", "other", "a", Vec::new()))
            .await
            .unwrap();

        let page = store.get_by_user("u1", 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].request, "q2");
        assert_eq!(page.records[0].source, ChatSource::Official);
        assert_eq!(page.records[0].related_procedures, related);

        let page = store.get_by_user("u1", 2, 2).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].request, "q0");

        let page = store.get_by_user("u1", usize::MAX, 100).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_record() {
        let store = SqliteChatHistory::open_in_memory().unwrap();
        let record = ChatRecord::new("u1", "What is the weather?", "Sunny", Vec::new());
        store.save(&record).await.unwrap();

        let page = store.get_by_user("u1", 1, 10).await.unwrap();
        let loaded = &page.records[0];
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.source, ChatSource::Unofficial);
        assert!(loaded.related_procedures.is_empty());
        assert_eq!(
            loaded.created_at.timestamp_micros(),
            record.created_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_is_storage_error() {
        let store = SqliteChatHistory::open_in_memory().unwrap();
        let record = ChatRecord::new("u1", "q", "a", Vec::new());
        store.save(&record).await.unwrap();

        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, AiError::Storage(_)));
    }

    #[tokio::test]
    async fn test_delete_by_user() {
        let store = SqliteChatHistory::open_in_memory().unwrap();
        store.save(&ChatRecord::new("u1", "a", "a", Vec::new())).await.unwrap();
        store.save(&ChatRecord::new("u2", "b", "b", Vec::new())).await.unwrap();

        assert_eq!(store.delete_by_user("u1").await.unwrap(), 1);
        assert_eq!(store.get_by_user("u1", 1, 10).await.unwrap().total, 0);
        assert_eq!(store.get_by_user("u2", 1, 10).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history.db");

        {
            let store = SqliteChatHistory::open(&path).unwrap();
            store.save(&ChatRecord::new("u1", "q", "a", Vec::new())).await.unwrap();
        }

        let store = SqliteChatHistory::open(&path).unwrap();
        assert_eq!(store.get_by_user("u1", 1, 10).await.unwrap().total, 1);
    }

    #[test]
    fn test_schema_version_recorded() {
        let store = SqliteChatHistory::open_in_memory().unwrap();
        let version: i32 = store
            .conn
            .lock()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_open_rejects_non_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        assert!(SqliteChatHistory::open(&path).is_err());
    }
}
