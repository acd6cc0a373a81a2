//! Data-access session over one pooled connection.
//!
//! A session lives for one unit of work. Dropping it returns the connection
//! to the pool, which is how every exit path of the worker releases it.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use std::time::Duration;

use stepwise_core::config::{CONFIG_SCHEMA_VERSION, ConfigKey, upgrade_value};
use stepwise_core::{
    Agent, AgentConfigurationEntry, AgentExecution, AgentId, ExecutionId, ExecutionStatus,
    ProjectId, StepOutcome, ToolDescriptor, ToolId,
};

use crate::error::{StoreError, StoreResult};
use crate::pool::PooledConnection;

const EXECUTION_COLUMNS: &str = "id, agent_id, name, status, steps_completed, last_error, error_kind, created_at, updated_at";

pub struct StoreSession {
    conn: PooledConnection,
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: AgentId::new(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        project_id: row.get::<_, Option<i64>>(3)?.map(ProjectId::new),
        agent_workflow_id: row.get(4)?,
        created_at: timestamp(row.get(5)?),
    })
}

fn descriptor_from_row(row: &Row<'_>) -> rusqlite::Result<ToolDescriptor> {
    Ok(ToolDescriptor {
        id: ToolId::new(row.get(0)?),
        name: row.get(1)?,
        class_name: row.get(2)?,
        folder_name: row.get(3)?,
        file_name: row.get(4)?,
    })
}

/// Execution row before its status string is validated.
struct ExecutionRow {
    id: i64,
    agent_id: i64,
    name: String,
    status: String,
    steps_completed: u32,
    last_error: Option<String>,
    error_kind: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            name: row.get(2)?,
            status: row.get(3)?,
            steps_completed: row.get(4)?,
            last_error: row.get(5)?,
            error_kind: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_execution(self) -> StoreResult<AgentExecution> {
        let status = self
            .status
            .parse::<ExecutionStatus>()
            .map_err(|e| StoreError::CorruptRow(format!("execution {}: {}", self.id, e)))?;
        Ok(AgentExecution {
            id: ExecutionId::new(self.id),
            agent_id: AgentId::new(self.agent_id),
            name: self.name,
            status,
            steps_completed: self.steps_completed,
            last_error: self.last_error,
            error_kind: self.error_kind,
            created_at: timestamp(self.created_at),
            updated_at: timestamp(self.updated_at),
        })
    }
}

impl StoreSession {
    pub(crate) fn new(conn: PooledConnection) -> Self {
        Self { conn }
    }

    // ---- agents -------------------------------------------------------

    pub fn create_agent(
        &self,
        name: &str,
        description: Option<&str>,
        project_id: Option<ProjectId>,
    ) -> StoreResult<Agent> {
        self.conn.execute(
            "INSERT INTO agents (name, description, project_id) VALUES (?1, ?2, ?3)",
            params![name, description, project_id.map(ProjectId::get)],
        )?;
        let id = AgentId::new(self.conn.last_insert_rowid());
        self.get_agent(id)?.ok_or(StoreError::NotFound {
            entity: "agent",
            id: id.get(),
        })
    }

    pub fn get_agent(&self, id: AgentId) -> StoreResult<Option<Agent>> {
        let agent = self
            .conn
            .query_row(
                "SELECT id, name, description, project_id, agent_workflow_id, created_at
                 FROM agents WHERE id = ?1",
                params![id.get()],
                agent_from_row,
            )
            .optional()?;
        Ok(agent)
    }

    // ---- configuration ------------------------------------------------

    /// Insert or replace one configuration value, stored in the current encoding.
    pub fn set_configuration(&self, agent_id: AgentId, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO agent_configurations (agent_id, key, value, schema_version)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (agent_id, key) DO UPDATE SET
                value = excluded.value,
                schema_version = excluded.schema_version,
                updated_at = strftime('%s', 'now')",
            params![agent_id.get(), key, value, CONFIG_SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// All configuration rows of an agent in insertion order.
    pub fn configuration_entries(&self, agent_id: AgentId) -> StoreResult<Vec<AgentConfigurationEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value, schema_version FROM agent_configurations
             WHERE agent_id = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![agent_id.get()], |row| {
                Ok(AgentConfigurationEntry {
                    agent_id,
                    key: row.get(0)?,
                    value: row.get(1)?,
                    schema_version: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Rewrite rows stored in an older value encoding.
    ///
    /// Rows whose legacy value cannot be read are left untouched so the
    /// materializer reports them when their agent next runs. Returns the
    /// number of rows upgraded.
    pub fn upgrade_configuration_values(&self) -> StoreResult<usize> {
        let stale: Vec<(i64, String, String, u32)> = {
            let mut stmt = self.conn.prepare(
                "SELECT id, key, value, schema_version FROM agent_configurations
                 WHERE schema_version < ?1",
            )?;
            stmt.query_map(params![CONFIG_SCHEMA_VERSION], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?
        };

        let tx = self.conn.unchecked_transaction()?;
        let mut upgraded = 0;
        for (id, key, value, version) in stale {
            let new_value = match ConfigKey::from_key(&key) {
                Some(config_key) => match upgrade_value(config_key, &value, version) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(row = id, error = %e, "Leaving unreadable configuration value as is");
                        continue;
                    }
                },
                None => value,
            };
            tx.execute(
                "UPDATE agent_configurations SET value = ?1, schema_version = ?2 WHERE id = ?3",
                params![new_value, CONFIG_SCHEMA_VERSION, id],
            )?;
            upgraded += 1;
        }
        tx.commit()?;
        Ok(upgraded)
    }

    // ---- tool descriptors ---------------------------------------------

    pub fn register_tool(
        &self,
        name: &str,
        class_name: &str,
        folder_name: &str,
        file_name: &str,
    ) -> StoreResult<ToolDescriptor> {
        self.conn.execute(
            "INSERT INTO tool_descriptors (name, class_name, folder_name, file_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, class_name, folder_name, file_name],
        )?;
        Ok(ToolDescriptor {
            id: ToolId::new(self.conn.last_insert_rowid()),
            name: name.to_string(),
            class_name: class_name.to_string(),
            folder_name: folder_name.to_string(),
            file_name: file_name.to_string(),
        })
    }

    pub fn tool_descriptor(&self, id: ToolId) -> StoreResult<Option<ToolDescriptor>> {
        let descriptor = self
            .conn
            .query_row(
                "SELECT id, name, class_name, folder_name, file_name FROM tool_descriptors WHERE id = ?1",
                params![id.get()],
                descriptor_from_row,
            )
            .optional()?;
        Ok(descriptor)
    }

    pub fn list_tool_descriptors(&self) -> StoreResult<Vec<ToolDescriptor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, class_name, folder_name, file_name FROM tool_descriptors ORDER BY id")?;
        let descriptors = stmt
            .query_map([], descriptor_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(descriptors)
    }

    // ---- executions ---------------------------------------------------

    pub fn create_execution(&self, agent_id: AgentId, name: &str) -> StoreResult<AgentExecution> {
        if self.get_agent(agent_id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "agent",
                id: agent_id.get(),
            });
        }
        self.conn.execute(
            "INSERT INTO agent_executions (agent_id, name, status) VALUES (?1, ?2, ?3)",
            params![agent_id.get(), name, ExecutionStatus::Pending.as_str()],
        )?;
        let id = ExecutionId::new(self.conn.last_insert_rowid());
        self.get_execution(id)?.ok_or(StoreError::NotFound {
            entity: "execution",
            id: id.get(),
        })
    }

    pub fn get_execution(&self, id: ExecutionId) -> StoreResult<Option<AgentExecution>> {
        let sql = format!("SELECT {} FROM agent_executions WHERE id = ?1", EXECUTION_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id.get()], ExecutionRow::from_row)
            .optional()?;
        row.map(ExecutionRow::into_execution).transpose()
    }

    pub fn list_executions(&self, status: Option<ExecutionStatus>) -> StoreResult<Vec<AgentExecution>> {
        let sql = format!(
            "SELECT {} FROM agent_executions WHERE ?1 IS NULL OR status = ?1 ORDER BY id",
            EXECUTION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![status.map(|s| s.as_str())], ExecutionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ExecutionRow::into_execution).collect()
    }

    /// Move a runnable execution to `RUNNING`. Returns `false` when the
    /// execution is already terminal.
    pub fn mark_running(&self, id: ExecutionId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE agent_executions SET status = 'RUNNING', updated_at = strftime('%s', 'now')
             WHERE id = ?1 AND status IN ('PENDING', 'RUNNING')",
            params![id.get()],
        )?;
        Ok(changed == 1)
    }

    /// Record step `step` as finished: bump the step counter and, on
    /// `Complete`, move the execution to its terminal state.
    ///
    /// Only a running execution whose counter still reads `step` is
    /// touched. Returns `None` when another delivery already recorded this
    /// step, otherwise the status the execution is left in.
    pub fn record_step(
        &self,
        id: ExecutionId,
        step: u32,
        outcome: StepOutcome,
    ) -> StoreResult<Option<ExecutionStatus>> {
        let tx = self.conn.unchecked_transaction()?;
        let counted = tx.execute(
            "UPDATE agent_executions SET steps_completed = steps_completed + 1,
                updated_at = strftime('%s', 'now')
             WHERE id = ?1 AND status = 'RUNNING' AND steps_completed = ?2",
            params![id.get(), step],
        )?;
        if counted == 1 && outcome == StepOutcome::Complete {
            tx.execute(
                "UPDATE agent_executions SET status = 'COMPLETE' WHERE id = ?1 AND status = 'RUNNING'",
                params![id.get()],
            )?;
        }
        tx.commit()?;

        let execution = self.get_execution(id)?.ok_or(StoreError::NotFound {
            entity: "execution",
            id: id.get(),
        })?;
        if counted == 0 && execution.steps_completed != step {
            return Ok(None);
        }
        Ok(Some(execution.status))
    }

    /// Persist a failure of step `step` with its kind.
    ///
    /// Terminal executions, and executions that already moved past `step`,
    /// are left as they are.
    pub fn mark_failed(&self, id: ExecutionId, step: u32, kind: &str, message: &str) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE agent_executions
             SET status = 'FAILED', error_kind = ?3, last_error = ?4, updated_at = strftime('%s', 'now')
             WHERE id = ?1 AND steps_completed = ?2 AND status IN ('PENDING', 'RUNNING')",
            params![id.get(), step, kind, message],
        )?;
        Ok(changed == 1)
    }

    /// Flip a non-terminal execution to `CANCELLED`.
    pub fn cancel_execution(&self, id: ExecutionId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE agent_executions SET status = 'CANCELLED', updated_at = strftime('%s', 'now')
             WHERE id = ?1 AND status IN ('PENDING', 'RUNNING')",
            params![id.get()],
        )?;
        Ok(changed == 1)
    }

    // ---- step lease ---------------------------------------------------

    /// Claim the right to run step `step` of an execution.
    ///
    /// Succeeds when the execution is runnable, its counter still reads
    /// `step`, and no lease is held or the held one has expired. `owner`
    /// must be unique per claim.
    pub fn claim_lease(&self, id: ExecutionId, step: u32, owner: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Utc::now().timestamp_millis();
        let expires = now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
        let changed = self.conn.execute(
            "UPDATE agent_executions SET lease_owner = ?3, lease_expires_at = ?4
             WHERE id = ?1 AND steps_completed = ?2 AND status IN ('PENDING', 'RUNNING')
               AND (lease_owner IS NULL OR lease_expires_at < ?5)",
            params![id.get(), step, owner, expires, now],
        )?;
        Ok(changed == 1)
    }

    /// Release a lease held by `owner`. Releasing a lease held by someone
    /// else is a no-op.
    pub fn release_lease(&self, id: ExecutionId, owner: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE agent_executions SET lease_owner = NULL, lease_expires_at = NULL
             WHERE id = ?1 AND lease_owner = ?2",
            params![id.get(), owner],
        )?;
        Ok(())
    }
}
