//! Redis-backed vector store.
//!
//! One hash per namespace (`stepwise:ltm:{collection}:ns:{namespace}`) maps
//! entry ids to JSON entries; `stepwise:ltm:{collection}:index` maps ids back
//! to their namespace. Scoring happens in process.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};
use crate::store::VectorStore;
use crate::types::{MemoryQuery, SearchResult, VectorEntry, rank};

pub struct RedisVectorStore {
    collection: String,
    pool: deadpool_redis::Pool,
}

impl RedisVectorStore {
    /// Connect and verify the server answers PING.
    pub async fn connect(url: &str, collection: impl Into<String>) -> MemoryResult<Self> {
        let pool = deadpool_redis::Config::from_url(url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| MemoryError::ConnectionFailed(e.to_string()))?;
        let store = Self {
            collection: collection.into(),
            pool,
        };
        let mut conn = store.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| MemoryError::ConnectionFailed(format!("PING failed: {}", e)))?;
        info!(collection = %store.collection, "Redis vector store connected");
        Ok(store)
    }

    async fn connection(&self) -> MemoryResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| MemoryError::ConnectionFailed(e.to_string()))
    }

    fn namespace_key(collection: &str, namespace: &str) -> String {
        format!("stepwise:ltm:{}:ns:{}", collection, namespace)
    }

    fn index_key(collection: &str) -> String {
        format!("stepwise:ltm:{}:index", collection)
    }

    async fn namespaces(&self, conn: &mut deadpool_redis::Connection) -> MemoryResult<Vec<String>> {
        let mut namespaces: Vec<String> = conn.hvals(Self::index_key(&self.collection)).await?;
        namespaces.sort();
        namespaces.dedup();
        Ok(namespaces)
    }
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, entry: VectorEntry) -> MemoryResult<()> {
        let json = serde_json::to_string(&entry)?;
        let id = entry.id.to_string();
        let mut conn = self.connection().await?;
        redis::pipe()
            .atomic()
            .hset(Self::namespace_key(&self.collection, &entry.namespace), &id, json)
            .ignore()
            .hset(Self::index_key(&self.collection), &id, &entry.namespace)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await?;
        debug!(id = %entry.id, collection = %self.collection, "Upserted memory");
        Ok(())
    }

    async fn search(&self, query: MemoryQuery) -> MemoryResult<Vec<SearchResult>> {
        let mut conn = self.connection().await?;
        let namespaces = match &query.namespace {
            Some(namespace) => vec![namespace.clone()],
            None => self.namespaces(&mut conn).await?,
        };
        let mut entries = Vec::new();
        for namespace in namespaces {
            let raw: Vec<String> = conn
                .hvals(Self::namespace_key(&self.collection, &namespace))
                .await?;
            for json in raw {
                entries.push(serde_json::from_str::<VectorEntry>(&json)?);
            }
        }
        Ok(rank(entries, &query))
    }

    async fn delete(&self, id: Uuid) -> MemoryResult<()> {
        let id = id.to_string();
        let mut conn = self.connection().await?;
        let namespace: Option<String> = conn.hget(Self::index_key(&self.collection), &id).await?;
        if let Some(namespace) = namespace {
            redis::pipe()
                .atomic()
                .hdel(Self::namespace_key(&self.collection, &namespace), &id)
                .ignore()
                .hdel(Self::index_key(&self.collection), &id)
                .ignore()
                .query_async::<()>(&mut *conn)
                .await?;
        }
        Ok(())
    }

    async fn count(&self, namespace: &str) -> MemoryResult<usize> {
        let mut conn = self.connection().await?;
        Ok(conn.hlen(Self::namespace_key(&self.collection, namespace)).await?)
    }
}
