//! # Stepwise Store
//!
//! SQLite-backed relational store holding agents, their configuration rows,
//! executions and tool descriptors. It is the single source of truth of the
//! pipeline: workers read and update it through short-lived sessions.
//!
//! - WAL mode and a fixed-size connection pool
//! - Versioned schema migrations tracked in `schema_migrations`
//! - Conditional status transitions so a cancelled or finished execution is
//!   never overwritten by a late step

pub mod error;
pub mod migration;
pub mod pool;
pub mod session;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use migration::{Migration, MigrationEngine};
pub use pool::{ConnectionConfig, PooledConnection, SqlitePool};
pub use session::StoreSession;
pub use store::{DEFAULT_POOL_SIZE, SqliteStore};
