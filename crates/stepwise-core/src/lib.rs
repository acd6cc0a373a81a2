//! # Stepwise Core
//!
//! Domain model and contracts shared by every Stepwise crate: the persisted
//! agent and execution records, the error taxonomy of the execution pipeline,
//! the tool capability contract, and the materializer that turns an agent's
//! raw key/value configuration into a typed record.

pub mod config;
pub mod error;
pub mod identifiers;
pub mod model;
pub mod tool;

pub use config::{ConfigKey, ConfigurationMaterializer, MaterializedConfiguration};
pub use error::{
    BoxError, ConfigParseError, ErrorKind, PipelineError, PipelineResult, StepExecutionError,
    ToolResolutionError,
};
pub use identifiers::{AgentId, ExecutionId, ProjectId, ToolId};
pub use model::{
    Agent, AgentConfigurationEntry, AgentExecution, ExecutionStatus, StepOutcome, ToolDescriptor,
    UnitOfWork,
};
pub use tool::{ExecutionResult, FailureReason, Tool, ToolSpec};
