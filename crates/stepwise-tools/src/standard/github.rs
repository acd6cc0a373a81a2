//! Fetch a file from a GitHub repository through the contents API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde_json::{Value, json};
use stepwise_core::{ExecutionResult, FailureReason, Tool};

use super::{arg, optional_str, required_str};
use crate::http::{client, run_async, send_json};
use crate::settings::ToolSettings;

#[derive(Debug)]
pub struct GithubRepoSearchTool {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl GithubRepoSearchTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            base_url: settings.github_base_url.trim_end_matches('/').to_string(),
            token: settings.github_token.clone(),
            client: client(settings.http_timeout_secs),
        }
    }

    fn content_path(owner: &str, repo: &str, folder: Option<&str>, file_name: &str) -> String {
        let folder = folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty());
        match folder {
            Some(folder) => format!("repos/{}/{}/contents/{}/{}", owner, repo, folder, file_name),
            None => format!("repos/{}/{}/contents/{}", owner, repo, file_name),
        }
    }

    async fn fetch(&self, path: String, resource: String) -> ExecutionResult {
        let mut request = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let file = match send_json(request, &resource).await {
            Ok(file) => file,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        if file.is_array() {
            return ExecutionResult::invalid_input(format!("{} is a directory", resource));
        }
        let Some(encoded) = file.get("content").and_then(Value::as_str) else {
            return ExecutionResult::failed(FailureReason::InternalError {
                message: format!("{} has no inline content", resource),
            });
        };
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        match BASE64.decode(compact) {
            Ok(bytes) => ExecutionResult::success(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => ExecutionResult::failure(format!("cannot decode {}: {}", resource, e)),
        }
    }
}

impl Tool for GithubRepoSearchTool {
    fn name(&self) -> &str {
        "GithubRepo Search"
    }

    fn description(&self) -> &str {
        "Search for a file inside a Github repository"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "repository_owner": {"type": "string", "description": "Owner of the github repository"},
                "repository_name": {"type": "string", "description": "Repository name in which we have to search"},
                "file_name": {"type": "string", "description": "Name of the file we need to fetch from the repository"},
                "folder_path": {"type": "string", "description": "Folder path in which the file is present"}
            },
            "required": ["repository_owner", "repository_name", "file_name"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let owner = arg!(required_str(&args, "repository_owner"));
        let repo = arg!(required_str(&args, "repository_name"));
        let file_name = arg!(required_str(&args, "file_name"));
        let folder = optional_str(&args, "folder_path");

        let path = Self::content_path(owner, repo, folder, file_name);
        let resource = format!("{}/{}: {}", owner, repo, file_name);
        run_async(|| self.fetch(path, resource))
    }
}
