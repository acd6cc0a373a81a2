//! # Stepwise Testing
//!
//! Test doubles shared by the workspace tests.
//!
//! - [`MockTool`] / [`MockToolPlugin`]: predictable tools, resolvable from
//!   descriptors
//! - [`ScriptedRuntime`]: replays step outcomes and records what it saw
//! - [`ScriptedChatModel`] / [`StaticModelProvider`]: canned model replies
//! - [`TestDatabase`]: migrated SQLite store in a temporary directory

pub mod fixtures;
pub mod mock_tools;
pub mod scripted;

pub use fixtures::TestDatabase;
pub use mock_tools::{MockTool, MockToolPlugin};
pub use scripted::{ObservedStep, ScriptedChatModel, ScriptedRuntime, ScriptedStep, StaticModelProvider};
