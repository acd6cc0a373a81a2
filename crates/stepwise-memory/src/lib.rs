//! # Stepwise Memory
//!
//! Long-term memory for agents: a [`VectorStore`] contract with in-memory,
//! SQLite and Redis implementations, embedding providers, and the
//! [`MemoryProvisioner`] that picks a backend from an agent's `LTM_DB`
//! setting.
//!
//! ```rust
//! use std::sync::Arc;
//! use stepwise_memory::{HashingEmbedder, LtmBackend, MemoryProvisioner, MemorySettings};
//!
//! # async fn example() {
//! let provisioner = MemoryProvisioner::new(
//!     MemorySettings { default_backend: LtmBackend::InMemory, ..Default::default() },
//!     Arc::new(HashingEmbedder::default()),
//! );
//! let memory = provisioner.provision(None).await;
//! assert_eq!(memory.collection(), "agent-index-1");
//! # }
//! ```

pub mod embeddings;
pub mod error;
pub mod provisioner;
pub mod sqlite;
pub mod store;
pub mod types;

#[cfg(feature = "redis")]
pub mod redis;

pub use embeddings::{EmbeddingProvider, HashingEmbedder, OpenAiEmbeddings};
pub use error::{MemoryError, MemoryResult};
pub use provisioner::{
    COLLECTION_NAME, LongTermMemory, LtmBackend, MemoryProvisioner, MemorySettings, agent_namespace,
};
pub use sqlite::SqliteVectorStore;
pub use store::{InMemoryVectorStore, VectorStore};
pub use types::{MemoryQuery, SearchResult, VectorEntry, cosine_similarity};

#[cfg(feature = "redis")]
pub use redis::RedisVectorStore;
