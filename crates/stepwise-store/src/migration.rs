//! Schema migration engine for the relational store

use rusqlite::{Connection, params};

use crate::error::{StoreError, StoreResult};

/// Individual migration definition
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

/// Applies versioned migrations and records them in `schema_migrations`
pub struct MigrationEngine {
    migrations: Vec<Migration>,
}

impl Default for MigrationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationEngine {
    pub fn new() -> Self {
        Self {
            migrations: Self::default_migrations(),
        }
    }

    fn default_migrations() -> Vec<Migration> {
        vec![
            Migration {
                version: 1,
                description: "Create agents, configurations, executions and tool descriptors",
                up: r#"
                    CREATE TABLE IF NOT EXISTS agents (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        name TEXT NOT NULL,
                        description TEXT,
                        project_id INTEGER,
                        agent_workflow_id INTEGER,
                        created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
                    );

                    CREATE TABLE IF NOT EXISTS agent_configurations (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        agent_id INTEGER NOT NULL REFERENCES agents(id),
                        key TEXT NOT NULL,
                        value TEXT NOT NULL,
                        updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                        UNIQUE (agent_id, key)
                    );

                    CREATE TABLE IF NOT EXISTS agent_executions (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        agent_id INTEGER NOT NULL,
                        name TEXT NOT NULL,
                        status TEXT NOT NULL DEFAULT 'PENDING',
                        last_error TEXT,
                        created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                        updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
                    );

                    CREATE TABLE IF NOT EXISTS tool_descriptors (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        name TEXT NOT NULL,
                        class_name TEXT NOT NULL,
                        folder_name TEXT NOT NULL,
                        file_name TEXT NOT NULL,
                        created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
                    );

                    CREATE INDEX IF NOT EXISTS idx_configurations_agent ON agent_configurations(agent_id);
                    CREATE INDEX IF NOT EXISTS idx_executions_status ON agent_executions(status);
                "#,
            },
            Migration {
                version: 2,
                description: "Track error kind, step count and step lease on executions",
                up: r#"
                    ALTER TABLE agent_executions ADD COLUMN error_kind TEXT;
                    ALTER TABLE agent_executions ADD COLUMN steps_completed INTEGER NOT NULL DEFAULT 0;
                    ALTER TABLE agent_executions ADD COLUMN lease_owner TEXT;
                    ALTER TABLE agent_executions ADD COLUMN lease_expires_at INTEGER;
                "#,
            },
            Migration {
                version: 3,
                description: "Version the encoding of configuration values",
                // Rows that predate this migration keep version 0 until upgraded
                up: r#"
                    ALTER TABLE agent_configurations ADD COLUMN schema_version INTEGER NOT NULL DEFAULT 0;
                "#,
            },
        ]
    }

    /// Latest version this engine knows about
    pub fn latest_version(&self) -> u32 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    /// Version currently recorded in the database
    pub fn current_version(&self, conn: &Connection) -> StoreResult<u32> {
        Self::ensure_tracking_table(conn)?;
        let version: u32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    fn ensure_tracking_table(conn: &Connection) -> StoreResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )
        .map_err(|e| StoreError::MigrationFailed {
            version: 0,
            reason: format!("Failed to create migrations table: {}", e),
        })?;
        Ok(())
    }

    /// Run migrations up to the specified version, returning how many were applied
    pub fn migrate(&self, conn: &Connection, target_version: Option<u32>) -> StoreResult<usize> {
        let current = self.current_version(conn)?;
        let target = target_version.unwrap_or_else(|| self.latest_version());

        let mut applied = 0;
        for migration in &self.migrations {
            if migration.version > current && migration.version <= target {
                self.apply_migration(conn, migration)?;
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "Applied schema migration"
                );
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn apply_migration(&self, conn: &Connection, migration: &Migration) -> StoreResult<()> {
        let failed = |e: rusqlite::Error| StoreError::MigrationFailed {
            version: migration.version,
            reason: e.to_string(),
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.up).map_err(failed)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, description) VALUES (?1, ?2)",
            params![migration.version, migration.description],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;
        Ok(())
    }
}
