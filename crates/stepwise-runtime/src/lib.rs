//! # Stepwise Runtime
//!
//! The agent runtime a worker invokes for one step, and its collaborators.
//!
//! - [`AgentRuntime`]: `step(context, goals) -> CONTINUE | COMPLETE`
//! - [`RuntimeContext`]: name, role, bound model, tool set, long-term memory
//!   and the materialized configuration of the step
//! - [`ModelProvider`] / [`ChatModel`]: binds the agent's `model` setting to
//!   an OpenAI-compatible chat-completions endpoint
//! - [`ToolUsingRuntime`]: the default runtime, one tool command per step

pub mod context;
pub mod error;
pub mod model;
pub mod prompt;
pub mod runtime;

pub use context::RuntimeContext;
pub use error::{RuntimeError, RuntimeResult};
pub use model::{
    ChatMessage, ChatModel, ChatRole, DEFAULT_MODEL, ModelProvider, OPENAI_API_BASE, OpenAiChatModel,
    OpenAiProvider,
};
pub use prompt::{AgentCommand, FINISH_COMMAND};
pub use runtime::{AgentRuntime, ToolUsingRuntime};
