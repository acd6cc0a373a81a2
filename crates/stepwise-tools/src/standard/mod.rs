//! # Built-in tools
//!
//! - **File**: sandboxed read and write under the resources directory
//! - **E-mail**: Maildir inbox reader and outbox writer, with attachments
//! - **Jira**: issue create, edit and search, project listing (REST v2)
//! - **Search**: Google Custom Search
//! - **GitHub**: fetch a file from a repository

pub mod email;
pub mod file;
pub mod github;
pub mod jira;
pub mod search;

pub use email::{ReadEmailTool, SendEmailTool, SendEmailWithAttachmentTool};
pub use file::{ReadFileTool, WriteFileTool};
pub use github::GithubRepoSearchTool;
pub use jira::{CreateIssueTool, EditIssueTool, ListProjectsTool, SearchIssuesTool};
pub use search::WebSearchTool;

use serde_json::Value;
use stepwise_core::ExecutionResult;

/// A required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ExecutionResult> {
    match args.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(ExecutionResult::invalid_input(format!("'{}' must not be empty", key))),
        None => Err(ExecutionResult::invalid_input(format!(
            "missing string argument '{}'",
            key
        ))),
    }
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|v| !v.trim().is_empty())
}

/// Early-return the failure of an argument lookup.
macro_rules! arg {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(failure) => return failure,
        }
    };
}
pub(crate) use arg;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_arguments_must_be_present_strings() {
        let args = json!({"name": "notes.txt", "blank": " ", "count": 3});
        assert_eq!(required_str(&args, "name").unwrap(), "notes.txt");
        assert!(required_str(&args, "blank").is_err());
        assert!(required_str(&args, "count").is_err());
        assert!(required_str(&args, "missing").is_err());
        assert_eq!(optional_str(&args, "blank"), None);
    }
}
