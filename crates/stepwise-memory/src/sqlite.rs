//! SQLite-backed durable vector store.
//!
//! Vectors are persisted as JSON arrays and scored in process; several
//! collections may share one database file.

use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};
use crate::store::VectorStore;
use crate::types::{MemoryQuery, SearchResult, VectorEntry, rank};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS vector_entries (
        id          TEXT PRIMARY KEY,
        collection  TEXT NOT NULL,
        namespace   TEXT NOT NULL,
        content     TEXT NOT NULL,
        vector_json TEXT NOT NULL,
        metadata    TEXT NOT NULL,
        created_at  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_vector_entries_scope
        ON vector_entries(collection, namespace);
";

pub struct SqliteVectorStore {
    collection: String,
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>, collection: impl Into<String>) -> MemoryResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| MemoryError::ConnectionFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.as_ref().display(), "SQLite vector store opened");
        Ok(Self {
            collection: collection.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory(collection: impl Into<String>) -> MemoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            collection: collection.into(),
            conn: Mutex::new(conn),
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, String, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode(raw: (String, String, String, String, String, i64)) -> MemoryResult<VectorEntry> {
    let (id, namespace, content, vector_json, metadata, created_at) = raw;
    Ok(VectorEntry {
        id: Uuid::parse_str(&id).map_err(|e| MemoryError::Serialization(e.to_string()))?,
        namespace,
        content,
        vector: serde_json::from_str(&vector_json)?,
        metadata: serde_json::from_str(&metadata)?,
        created_at,
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, entry: VectorEntry) -> MemoryResult<()> {
        let vector_json = serde_json::to_string(&entry.vector)?;
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO vector_entries
                 (id, collection, namespace, content, vector_json, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id.to_string(),
                self.collection,
                entry.namespace,
                entry.content,
                vector_json,
                metadata_json,
                entry.created_at,
            ],
        )?;
        debug!(id = %entry.id, collection = %self.collection, "Upserted memory");
        Ok(())
    }

    async fn search(&self, query: MemoryQuery) -> MemoryResult<Vec<SearchResult>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, namespace, content, vector_json, metadata, created_at
             FROM vector_entries
             WHERE collection = ?1 AND (?2 IS NULL OR namespace = ?2)",
        )?;
        let rows = stmt
            .query_map(params![self.collection, query.namespace], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        let entries = rows.into_iter().map(decode).collect::<MemoryResult<Vec<_>>>()?;
        Ok(rank(entries, &query))
    }

    async fn delete(&self, id: Uuid) -> MemoryResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM vector_entries WHERE id = ?1 AND collection = ?2",
            params![id.to_string(), self.collection],
        )?;
        Ok(())
    }

    async fn count(&self, namespace: &str) -> MemoryResult<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vector_entries WHERE collection = ?1 AND namespace = ?2",
            params![self.collection, namespace],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
