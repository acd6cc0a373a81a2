//! # Stepwise Tools
//!
//! Tool resolution for agent steps and the built-in tool library.
//!
//! ## Resolution
//!
//! Tool descriptors persisted in the store name a `(module, class)` pair.
//! [`ToolFactoryRegistry`] maps each pair to a factory closure; built-ins are
//! registered by the [`BuiltinTools`] plugin and custom tools by further
//! [`ToolPlugin`]s installed at process start. [`ToolAssembler`] builds the
//! tool set of one step: the built-in catalog in fixed order, then the
//! configured custom tools in configuration order.
//!
//! ## Built-in tools
//!
//! - Web search (Google Custom Search)
//! - File read and write, sandboxed to a resources directory
//! - E-mail read, send, and send with attachment over a Maildir
//! - Jira issue create, search, edit and project listing
//! - GitHub repository file lookup

pub mod assembly;
pub mod catalog;
mod http;
pub mod registry;
pub mod settings;
pub mod standard;

pub use assembly::ToolAssembler;
pub use catalog::{BuiltinTool, BuiltinTools};
pub use registry::{ToolFactory, ToolFactoryRegistry, ToolKey, ToolPlugin, ToolSet};
pub use settings::ToolSettings;
pub use standard::*;
pub use stepwise_core::{ExecutionResult, FailureReason, Tool, ToolSpec};
