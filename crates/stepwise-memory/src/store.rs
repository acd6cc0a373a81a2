//! Vector store contract and the in-process store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};
use crate::types::{MemoryQuery, SearchResult, VectorEntry, rank};

/// A collection of embedded entries supporting upsert and similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the collection this handle reads and writes.
    fn collection(&self) -> &str;

    /// Insert or replace an entry by id.
    async fn upsert(&self, entry: VectorEntry) -> MemoryResult<()>;

    /// Entries most similar to `query.vector`, best first.
    async fn search(&self, query: MemoryQuery) -> MemoryResult<Vec<SearchResult>>;

    /// Remove an entry; absent ids are not an error.
    async fn delete(&self, id: Uuid) -> MemoryResult<()>;

    /// Number of entries in a namespace.
    async fn count(&self, namespace: &str) -> MemoryResult<usize>;
}

/// Brute-force store held in process memory.
///
/// With a capacity set, each namespace keeps at most that many entries and
/// the oldest insert is evicted first.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    collection: String,
    capacity: Option<usize>,
    entries: RwLock<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    by_id: HashMap<Uuid, VectorEntry>,
    /// Insertion order per namespace, oldest first
    order: HashMap<String, VecDeque<Uuid>>,
}

impl Entries {
    fn insert(&mut self, entry: VectorEntry, capacity: Option<usize>) -> Vec<Uuid> {
        let id = entry.id;
        let namespace = entry.namespace.clone();
        if let Some(previous) = self.by_id.insert(id, entry) {
            if previous.namespace == namespace {
                return Vec::new();
            }
            self.forget(&previous.namespace, id);
        }

        let order = self.order.entry(namespace).or_default();
        order.push_back(id);
        let mut evicted = Vec::new();
        if let Some(capacity) = capacity {
            while order.len() > capacity {
                let Some(oldest) = order.pop_front() else { break };
                self.by_id.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    fn remove(&mut self, id: Uuid) {
        if let Some(entry) = self.by_id.remove(&id) {
            self.forget(&entry.namespace, id);
        }
    }

    fn forget(&mut self, namespace: &str, id: Uuid) {
        if let Some(order) = self.order.get_mut(namespace) {
            order.retain(|held| *held != id);
            if order.is_empty() {
                self.order.remove(namespace);
            }
        }
    }
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            capacity: None,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Bound every namespace to `capacity` entries.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    fn read(&self) -> MemoryResult<RwLockReadGuard<'_, Entries>> {
        self.entries
            .read()
            .map_err(|e| MemoryError::Storage(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> MemoryResult<RwLockWriteGuard<'_, Entries>> {
        self.entries
            .write()
            .map_err(|e| MemoryError::Storage(format!("lock poisoned: {}", e)))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, entry: VectorEntry) -> MemoryResult<()> {
        let namespace = entry.namespace.clone();
        let evicted = self.write()?.insert(entry, self.capacity);
        if !evicted.is_empty() {
            debug!(namespace = %namespace, evicted = evicted.len(), "Evicted oldest in-memory entries");
        }
        Ok(())
    }

    async fn search(&self, query: MemoryQuery) -> MemoryResult<Vec<SearchResult>> {
        let entries = self.read()?;
        Ok(rank(entries.by_id.values().cloned(), &query))
    }

    async fn delete(&self, id: Uuid) -> MemoryResult<()> {
        self.write()?.remove(id);
        Ok(())
    }

    async fn count(&self, namespace: &str) -> MemoryResult<usize> {
        Ok(self.read()?.order.get(namespace).map_or(0, VecDeque::len))
    }
}
