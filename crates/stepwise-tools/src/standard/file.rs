//! # File Tools
//!
//! Read and write files inside the resources directory. Paths are relative
//! to that directory; absolute paths and `..` components are rejected.

use serde_json::{Value, json};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use stepwise_core::{ExecutionResult, FailureReason, Tool};

use super::{arg, required_str};

/// Resolve `name` inside `root`, refusing anything that escapes it.
pub(crate) fn sandboxed(root: &Path, name: &str) -> Result<PathBuf, ExecutionResult> {
    let relative = Path::new(name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ExecutionResult::failed(FailureReason::PermissionDenied {
            message: format!("'{}' is outside the resources directory", name),
        }));
    }
    Ok(root.join(relative))
}

fn io_failure(path: &str, err: std::io::Error) -> ExecutionResult {
    match err.kind() {
        ErrorKind::NotFound => ExecutionResult::failed(FailureReason::NotFound {
            resource: path.to_string(),
        }),
        ErrorKind::PermissionDenied => ExecutionResult::failed(FailureReason::PermissionDenied {
            message: format!("'{}': {}", path, err),
        }),
        _ => ExecutionResult::failed(FailureReason::IoError {
            message: format!("'{}': {}", path, err),
        }),
    }
}

/// Reads a text file from the resources directory.
#[derive(Debug)]
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "Read File"
    }

    fn description(&self) -> &str {
        "Reads the file content in a specified location"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string", "description": "Path of the file to read"}
            },
            "required": ["file_name"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let file_name = arg!(required_str(&args, "file_name"));
        let path = arg!(sandboxed(&self.root, file_name));
        match fs::read_to_string(&path) {
            Ok(content) => ExecutionResult::success(content),
            Err(e) => io_failure(file_name, e),
        }
    }
}

/// Writes a text file into the resources directory, creating parents.
#[derive(Debug)]
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "Write File"
    }

    fn description(&self) -> &str {
        "Writes text to a file"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string", "description": "Name of the file to write"},
                "content": {"type": "string", "description": "File content to write"}
            },
            "required": ["file_name", "content"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let file_name = arg!(required_str(&args, "file_name"));
        let Some(content) = args.get("content").and_then(Value::as_str) else {
            return ExecutionResult::invalid_input("missing string argument 'content'");
        };
        let path = arg!(sandboxed(&self.root, file_name));

        if let Some(Err(e)) = path.parent().map(fs::create_dir_all) {
            return io_failure(file_name, e);
        }
        match fs::write(&path, content) {
            Ok(()) => ExecutionResult::success(format!("File written successfully - {}", file_name)),
            Err(e) => io_failure(file_name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let write = WriteFileTool::new(dir.path());
        let read = ReadFileTool::new(dir.path());

        let result = write.execute(json!({"file_name": "notes/today.txt", "content": "buy milk"}));
        assert!(result.is_success(), "{:?}", result);
        assert_eq!(
            read.execute(json!({"file_name": "notes/today.txt"})).output(),
            "buy milk"
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = ReadFileTool::new(dir.path()).execute(json!({"file_name": "absent.txt"}));
        assert_eq!(
            result,
            ExecutionResult::failed(FailureReason::NotFound {
                resource: "absent.txt".into()
            })
        );
    }

    #[test]
    fn paths_cannot_escape_the_sandbox() {
        let dir = TempDir::new().unwrap();
        let write = WriteFileTool::new(dir.path().join("resources"));
        for name in ["../escape.txt", "/etc/passwd", "a/../../b"] {
            let result = write.execute(json!({"file_name": name, "content": "x"}));
            assert!(
                matches!(
                    result,
                    ExecutionResult::Failure {
                        reason: FailureReason::PermissionDenied { .. }
                    }
                ),
                "{} was accepted",
                name
            );
        }
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn arguments_are_validated() {
        let dir = TempDir::new().unwrap();
        let result = WriteFileTool::new(dir.path()).execute(json!({"file_name": "a.txt"}));
        assert!(matches!(
            result,
            ExecutionResult::Failure {
                reason: FailureReason::InvalidInput { .. }
            }
        ));
    }
}
