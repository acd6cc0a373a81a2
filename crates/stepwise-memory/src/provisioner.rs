//! Long-term memory backend selection.
//!
//! Selection never fails: an unset or unknown `LTM_DB` uses the configured
//! default backend, and a backend that cannot be opened is replaced by the
//! process-wide in-memory store.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use stepwise_core::AgentId;

use crate::embeddings::EmbeddingProvider;
use crate::error::{MemoryError, MemoryResult};
use crate::sqlite::SqliteVectorStore;
use crate::store::{InMemoryVectorStore, VectorStore};
use crate::types::{MemoryQuery, SearchResult, VectorEntry};

/// Collection every agent's long-term memory lives in.
pub const COLLECTION_NAME: &str = "agent-index-1";

/// Vector store backends `LTM_DB` can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LtmBackend {
    Sqlite,
    Redis,
    InMemory,
    /// Recognised for compatibility with stored configurations; not bundled.
    Pinecone,
}

impl LtmBackend {
    /// Parse a configured value, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "redis" => Some(Self::Redis),
            "memory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "pinecone" => Some(Self::Pinecone),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Redis => "redis",
            Self::InMemory => "memory",
            Self::Pinecone => "pinecone",
        }
    }
}

impl fmt::Display for LtmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where each backend keeps its data.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySettings {
    /// Used when `LTM_DB` is unset or unknown
    pub default_backend: LtmBackend,
    pub sqlite_path: PathBuf,
    pub redis_url: Option<String>,
    /// Entries kept per agent by the process-wide in-memory store
    pub fallback_capacity: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            default_backend: LtmBackend::Sqlite,
            sqlite_path: PathBuf::from("stepwise-ltm.db"),
            redis_url: None,
            fallback_capacity: 1000,
        }
    }
}

/// Namespace holding one agent's memories.
pub fn agent_namespace(agent_id: AgentId) -> String {
    format!("agent:{}", agent_id)
}

/// A vector store handle bound to the process embedding provider.
#[derive(Clone)]
pub struct LongTermMemory {
    backend: LtmBackend,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl fmt::Debug for LongTermMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongTermMemory")
            .field("backend", &self.backend)
            .field("collection", &self.store.collection())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl LongTermMemory {
    pub fn new(backend: LtmBackend, store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            backend,
            store,
            embedder,
        }
    }

    /// Backend actually serving this handle.
    pub fn backend(&self) -> LtmBackend {
        self.backend
    }

    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Embed `text` and store it in `namespace`.
    pub async fn remember(
        &self,
        namespace: &str,
        text: &str,
        metadata: serde_json::Value,
    ) -> MemoryResult<Uuid> {
        let vector = self.embedder.embed(text).await?;
        let entry = VectorEntry::new(namespace, text, vector).with_metadata(metadata);
        let id = entry.id;
        self.store.upsert(entry).await?;
        Ok(id)
    }

    /// The `limit` stored texts of `namespace` closest to `text`.
    pub async fn recall(&self, namespace: &str, text: &str, limit: usize) -> MemoryResult<Vec<SearchResult>> {
        let vector = self.embedder.embed(text).await?;
        self.store
            .search(MemoryQuery {
                vector,
                namespace: Some(namespace.to_string()),
                min_score: 0.0,
                limit,
            })
            .await
    }
}

/// Chooses and opens the vector store for each step.
///
/// Opened stores are cached per backend for the life of the provisioner.
/// The in-memory store, also used when a backend cannot be opened, is
/// shared by every agent and bounded by `fallback_capacity` per agent.
pub struct MemoryProvisioner {
    settings: MemorySettings,
    embedder: Arc<dyn EmbeddingProvider>,
    opened: DashMap<LtmBackend, Arc<dyn VectorStore>>,
    fallback: Arc<InMemoryVectorStore>,
}

impl MemoryProvisioner {
    pub fn new(settings: MemorySettings, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            opened: DashMap::new(),
            fallback: Arc::new(InMemoryVectorStore::new(COLLECTION_NAME).with_capacity(settings.fallback_capacity)),
            settings,
        }
    }

    pub fn settings(&self) -> &MemorySettings {
        &self.settings
    }

    /// Backend to use for a configured `LTM_DB` value.
    pub fn select(&self, ltm_db: Option<&str>) -> LtmBackend {
        let default = self.settings.default_backend;
        let Some(raw) = ltm_db.map(str::trim).filter(|raw| !raw.is_empty()) else {
            debug!(backend = %default, "LTM_DB unset, using default backend");
            return default;
        };
        match LtmBackend::parse(raw) {
            Some(LtmBackend::Pinecone) => {
                warn!(
                    requested = raw,
                    backend = %default,
                    "Pinecone long-term memory is not available, using default backend"
                );
                default
            }
            Some(backend) => backend,
            None => {
                warn!(requested = raw, backend = %default, "Unknown LTM_DB value, using default backend");
                default
            }
        }
    }

    /// Memory handle for a configured `LTM_DB` value.
    pub async fn provision(&self, ltm_db: Option<&str>) -> LongTermMemory {
        let backend = self.select(ltm_db);
        match self.open(backend).await {
            Ok(store) => LongTermMemory::new(backend, store, self.embedder.clone()),
            Err(e) => {
                warn!(
                    backend = %backend,
                    error = %e,
                    "Long-term memory backend unavailable, falling back to in-memory store"
                );
                LongTermMemory::new(LtmBackend::InMemory, self.fallback.clone(), self.embedder.clone())
            }
        }
    }

    async fn open(&self, backend: LtmBackend) -> MemoryResult<Arc<dyn VectorStore>> {
        if let Some(store) = self.opened.get(&backend) {
            return Ok(store.clone());
        }
        let store: Arc<dyn VectorStore> = match backend {
            LtmBackend::InMemory => self.fallback.clone(),
            LtmBackend::Sqlite => Arc::new(SqliteVectorStore::open(&self.settings.sqlite_path, COLLECTION_NAME)?),
            LtmBackend::Redis => self.open_redis().await?,
            LtmBackend::Pinecone => {
                return Err(MemoryError::BackendUnavailable {
                    backend: backend.to_string(),
                    reason: "no client bundled".to_string(),
                });
            }
        };
        Ok(self.opened.entry(backend).or_insert(store).clone())
    }

    #[cfg(feature = "redis")]
    async fn open_redis(&self) -> MemoryResult<Arc<dyn VectorStore>> {
        let url = self.settings.redis_url.as_deref().ok_or_else(|| MemoryError::BackendUnavailable {
            backend: "redis".to_string(),
            reason: "no redis URL configured".to_string(),
        })?;
        Ok(Arc::new(crate::redis::RedisVectorStore::connect(url, COLLECTION_NAME).await?))
    }

    #[cfg(not(feature = "redis"))]
    async fn open_redis(&self) -> MemoryResult<Arc<dyn VectorStore>> {
        Err(MemoryError::BackendUnavailable {
            backend: "redis".to_string(),
            reason: "built without the `redis` feature".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use tempfile::TempDir;

    fn provisioner(dir: &TempDir) -> MemoryProvisioner {
        MemoryProvisioner::new(
            MemorySettings {
                sqlite_path: dir.path().join("ltm.db"),
                ..Default::default()
            },
            Arc::new(HashingEmbedder::default()),
        )
    }

    #[test]
    fn parses_backend_names() {
        assert_eq!(LtmBackend::parse("SQLite"), Some(LtmBackend::Sqlite));
        assert_eq!(LtmBackend::parse(" redis "), Some(LtmBackend::Redis));
        assert_eq!(LtmBackend::parse("in-memory"), Some(LtmBackend::InMemory));
        assert_eq!(LtmBackend::parse("Pinecone"), Some(LtmBackend::Pinecone));
        assert_eq!(LtmBackend::parse("chroma"), None);
    }

    #[test]
    fn unset_unknown_and_pinecone_use_default() {
        let dir = TempDir::new().unwrap();
        let provisioner = provisioner(&dir);
        assert_eq!(provisioner.select(None), LtmBackend::Sqlite);
        assert_eq!(provisioner.select(Some("")), LtmBackend::Sqlite);
        assert_eq!(provisioner.select(Some("chroma")), LtmBackend::Sqlite);
        assert_eq!(provisioner.select(Some("Pinecone")), LtmBackend::Sqlite);
        assert_eq!(provisioner.select(Some("memory")), LtmBackend::InMemory);
    }

    #[tokio::test]
    async fn provisions_default_backend_when_unset() {
        let dir = TempDir::new().unwrap();
        let memory = provisioner(&dir).provision(None).await;
        assert_eq!(memory.backend(), LtmBackend::Sqlite);
        assert_eq!(memory.collection(), COLLECTION_NAME);
    }

    #[tokio::test]
    async fn unavailable_backend_falls_back_to_memory() {
        let dir = TempDir::new().unwrap();
        let provisioner = MemoryProvisioner::new(
            MemorySettings {
                default_backend: LtmBackend::Sqlite,
                sqlite_path: dir.path().join("missing").join("nested").join("ltm.db"),
                redis_url: None,
                fallback_capacity: 1000,
            },
            Arc::new(HashingEmbedder::default()),
        );
        assert_eq!(provisioner.provision(Some("sqlite")).await.backend(), LtmBackend::InMemory);
        assert_eq!(provisioner.provision(Some("redis")).await.backend(), LtmBackend::InMemory);
    }

    #[tokio::test]
    async fn stores_are_reused_across_steps() {
        let dir = TempDir::new().unwrap();
        let provisioner = provisioner(&dir);
        let namespace = agent_namespace(AgentId::new(4));

        let first = provisioner.provision(Some("memory")).await;
        first
            .remember(&namespace, "the launch code is 1234", serde_json::Value::Null)
            .await
            .unwrap();

        let second = provisioner.provision(Some("memory")).await;
        let recalled = second.recall(&namespace, "launch code", 3).await.unwrap();
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].entry.content, "the launch code is 1234");
    }

    #[tokio::test]
    async fn recall_is_scoped_to_the_agent() {
        let dir = TempDir::new().unwrap();
        let memory = provisioner(&dir).provision(Some("sqlite")).await;
        memory
            .remember(&agent_namespace(AgentId::new(1)), "secret of agent one", serde_json::Value::Null)
            .await
            .unwrap();
        let recalled = memory
            .recall(&agent_namespace(AgentId::new(2)), "secret", 5)
            .await
            .unwrap();
        assert!(recalled.is_empty());
    }

    #[tokio::test]
    async fn fallback_store_is_bounded_per_agent() {
        let dir = TempDir::new().unwrap();
        let provisioner = MemoryProvisioner::new(
            MemorySettings {
                default_backend: LtmBackend::Redis,
                sqlite_path: dir.path().join("ltm.db"),
                redis_url: None,
                fallback_capacity: 3,
            },
            Arc::new(HashingEmbedder::default()),
        );
        let namespace = agent_namespace(AgentId::new(8));

        for step in 0..10 {
            let memory = provisioner.provision(None).await;
            assert_eq!(memory.backend(), LtmBackend::InMemory);
            memory
                .remember(&namespace, &format!("observation {}", step), serde_json::Value::Null)
                .await
                .unwrap();
        }

        let memory = provisioner.provision(None).await;
        assert_eq!(memory.store().count(&namespace).await.unwrap(), 3);
        let recalled = memory.recall(&namespace, "observation 9", 10).await.unwrap();
        assert!(recalled.iter().all(|r| r.entry.content != "observation 0"));
    }
}
