//! Throwaway databases seeded with agents and executions.

use std::path::{Path, PathBuf};
use stepwise_core::{Agent, AgentExecution, AgentId};
use stepwise_store::{SqliteStore, StoreResult};
use tempfile::TempDir;

/// A migrated SQLite store in its own temporary directory.
///
/// The directory, and the database with it, is removed on drop.
pub struct TestDatabase {
    dir: TempDir,
    store: SqliteStore,
}

impl TestDatabase {
    pub fn new() -> StoreResult<Self> {
        let dir = TempDir::new().map_err(|e| stepwise_store::StoreError::InvalidPath(e.to_string()))?;
        let store = SqliteStore::open(dir.path().join("stepwise.db"), 4)?;
        Ok(Self { dir, store })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A path inside the temporary directory, e.g. for a vector store.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create an agent with the given configuration rows and one pending
    /// execution of it.
    pub fn seed_agent(&self, name: &str, config: &[(&str, &str)]) -> StoreResult<(Agent, AgentExecution)> {
        let session = self.store.session()?;
        let agent = session.create_agent(name, Some("test agent"), None)?;
        for (key, value) in config {
            session.set_configuration(agent.id, key, value)?;
        }
        let execution = session.create_execution(agent.id, &format!("{} run", name))?;
        Ok((agent, execution))
    }

    /// Remove an agent row while leaving its configuration and executions
    /// behind, as a concurrent admin delete would.
    pub fn delete_agent(&self, id: AgentId) -> StoreResult<()> {
        let conn = rusqlite::Connection::open(self.dir.path().join("stepwise.db"))?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        conn.execute("DELETE FROM agents WHERE id = ?1", [id.get()])?;
        Ok(())
    }
}
