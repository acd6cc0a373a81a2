//! # Jira Tools
//!
//! Issue tracker tools speaking the Jira REST v2 API with basic
//! authentication (user + API token).

use reqwest::Client;
use serde_json::{Value, json};
use stepwise_core::{ExecutionResult, FailureReason, Tool};

use super::{arg, optional_str, required_str};
use crate::http::{client, run_async, send_json};
use crate::settings::ToolSettings;

#[derive(Debug, Clone)]
struct JiraCredentials {
    url: String,
    user: String,
    token: String,
}

/// Connection shared by the Jira tools.
#[derive(Debug, Clone)]
struct JiraConnection {
    credentials: Option<JiraCredentials>,
    client: Client,
}

impl JiraConnection {
    fn new(settings: &ToolSettings) -> Self {
        let credentials = match (&settings.jira_url, &settings.jira_user, &settings.jira_token) {
            (Some(url), Some(user), Some(token)) => Some(JiraCredentials {
                url: url.trim_end_matches('/').to_string(),
                user: user.clone(),
                token: token.clone(),
            }),
            _ => None,
        };
        Self {
            credentials,
            client: client(settings.http_timeout_secs),
        }
    }

    fn credentials(&self) -> Result<&JiraCredentials, ExecutionResult> {
        self.credentials.as_ref().ok_or_else(|| {
            ExecutionResult::failed(FailureReason::PermissionDenied {
                message: "Jira URL, user and token must be configured".to_string(),
            })
        })
    }

    fn request(
        &self,
        credentials: &JiraCredentials,
        method: reqwest::Method,
        path: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/rest/api/2/{}", credentials.url, path))
            .basic_auth(&credentials.user, Some(&credentials.token))
            .header("Accept", "application/json")
    }
}

/// Creates a Jira issue.
#[derive(Debug)]
pub struct CreateIssueTool {
    jira: JiraConnection,
}

impl CreateIssueTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            jira: JiraConnection::new(settings),
        }
    }

    async fn create(&self, credentials: &JiraCredentials, fields: Value) -> ExecutionResult {
        let request = self
            .jira
            .request(credentials, reqwest::Method::POST, "issue")
            .json(&json!({ "fields": fields }));
        match send_json(request, "Jira issue").await {
            Ok(created) => {
                let key = created.get("key").and_then(Value::as_str).unwrap_or("unknown");
                ExecutionResult::success(format!("Issue {} created successfully", key))
            }
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

impl Tool for CreateIssueTool {
    fn name(&self) -> &str {
        "Create Jira Issue"
    }

    fn description(&self) -> &str {
        "Create a new Jira issue in a project"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_key": {"type": "string", "description": "Key of the project, e.g. 'OPS'"},
                "summary": {"type": "string", "description": "One-line summary of the issue"},
                "description": {"type": "string", "description": "Detailed description"},
                "issue_type": {"type": "string", "description": "Issue type name, default 'Task'"}
            },
            "required": ["project_key", "summary"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let credentials = arg!(self.jira.credentials());
        let project_key = arg!(required_str(&args, "project_key"));
        let summary = arg!(required_str(&args, "summary"));
        let mut fields = json!({
            "project": {"key": project_key},
            "summary": summary,
            "issuetype": {"name": optional_str(&args, "issue_type").unwrap_or("Task")},
        });
        if let Some(description) = optional_str(&args, "description") {
            fields["description"] = Value::from(description);
        }
        run_async(|| self.create(credentials, fields))
    }
}

/// Updates fields of an existing Jira issue.
#[derive(Debug)]
pub struct EditIssueTool {
    jira: JiraConnection,
}

impl EditIssueTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            jira: JiraConnection::new(settings),
        }
    }

    async fn edit(&self, credentials: &JiraCredentials, key: &str, fields: Value) -> ExecutionResult {
        let request = self
            .jira
            .request(credentials, reqwest::Method::PUT, &format!("issue/{}", key))
            .json(&json!({ "fields": fields }));
        match send_json(request, &format!("issue {}", key)).await {
            Ok(_) => ExecutionResult::success(format!("Issue {} updated successfully", key)),
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

impl Tool for EditIssueTool {
    fn name(&self) -> &str {
        "Edit Jira Issue"
    }

    fn description(&self) -> &str {
        "Edit fields of an existing Jira issue"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "Issue key, e.g. 'OPS-12'"},
                "fields": {"type": "object", "description": "Fields to set, e.g. {\"summary\": \"...\"}"}
            },
            "required": ["key", "fields"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let credentials = arg!(self.jira.credentials());
        let key = arg!(required_str(&args, "key"));
        let fields = match args.get("fields") {
            Some(fields @ Value::Object(map)) if !map.is_empty() => fields.clone(),
            _ => return ExecutionResult::invalid_input("'fields' must be a non-empty object"),
        };
        run_async(|| self.edit(credentials, key, fields))
    }
}

/// Searches Jira issues with a JQL query.
#[derive(Debug)]
pub struct SearchIssuesTool {
    jira: JiraConnection,
}

impl SearchIssuesTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            jira: JiraConnection::new(settings),
        }
    }

    async fn search(&self, credentials: &JiraCredentials, jql: &str, max_results: u64) -> ExecutionResult {
        let request = self
            .jira
            .request(credentials, reqwest::Method::GET, "search")
            .query(&[("jql", jql.to_string()), ("maxResults", max_results.to_string())]);
        let found = match send_json(request, "Jira search").await {
            Ok(found) => found,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        let issues: Vec<Value> = found
            .get("issues")
            .and_then(Value::as_array)
            .map(|issues| {
                issues
                    .iter()
                    .map(|issue| {
                        let fields = issue.get("fields").cloned().unwrap_or(Value::Null);
                        json!({
                            "key": issue.get("key"),
                            "summary": fields.get("summary"),
                            "status": fields.pointer("/status/name"),
                            "assignee": fields.pointer("/assignee/displayName"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        ExecutionResult::success(Value::from(issues).to_string())
    }
}

impl Tool for SearchIssuesTool {
    fn name(&self) -> &str {
        "Search Jira Issues"
    }

    fn description(&self) -> &str {
        "Search Jira issues using a JQL query"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "JQL query, e.g. 'project = OPS AND status = Open'"},
                "max_results": {"type": "integer", "description": "Maximum issues returned, default 10"}
            },
            "required": ["query"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let credentials = arg!(self.jira.credentials());
        let jql = arg!(required_str(&args, "query"));
        let max_results = args.get("max_results").and_then(Value::as_u64).unwrap_or(10);
        run_async(|| self.search(credentials, jql, max_results))
    }
}

/// Lists the Jira projects visible to the configured user.
#[derive(Debug)]
pub struct ListProjectsTool {
    jira: JiraConnection,
}

impl ListProjectsTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            jira: JiraConnection::new(settings),
        }
    }

    async fn list(&self, credentials: &JiraCredentials) -> ExecutionResult {
        let request = self.jira.request(credentials, reqwest::Method::GET, "project");
        match send_json(request, "Jira projects").await {
            Ok(Value::Array(projects)) => {
                let projects: Vec<Value> = projects
                    .iter()
                    .map(|p| json!({"key": p.get("key"), "name": p.get("name")}))
                    .collect();
                ExecutionResult::success(Value::from(projects).to_string())
            }
            Ok(other) => ExecutionResult::failure(format!("unexpected project list: {}", other)),
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

impl Tool for ListProjectsTool {
    fn name(&self) -> &str {
        "List Jira Projects"
    }

    fn description(&self) -> &str {
        "List the Jira projects available to the agent"
    }

    fn execute(&self, _args: Value) -> ExecutionResult {
        let credentials = arg!(self.jira.credentials());
        run_async(|| self.list(credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> ToolSettings {
        ToolSettings::default().with_jira(server.uri(), "bot", "secret")
    }

    async fn run(tool: Arc<dyn Tool>, args: Value) -> ExecutionResult {
        tokio::task::spawn_blocking(move || tool.execute(args)).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_issue_posts_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .and(header("authorization", "Basic Ym90OnNlY3JldA=="))
            .and(body_json(json!({"fields": {
                "project": {"key": "OPS"},
                "summary": "Disk full",
                "issuetype": {"name": "Bug"}
            }})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10001", "key": "OPS-7"})))
            .expect(1)
            .mount(&server)
            .await;

        let tool = Arc::new(CreateIssueTool::new(&settings(&server)));
        let result = run(tool, json!({"project_key": "OPS", "summary": "Disk full", "issue_type": "Bug"})).await;
        assert_eq!(result.output(), "Issue OPS-7 created successfully");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_summarizes_issues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("jql", "project = OPS"))
            .and(query_param("maxResults", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": [{"key": "OPS-1", "fields": {"summary": "Disk full", "status": {"name": "Open"}}}]
            })))
            .mount(&server)
            .await;

        let tool = Arc::new(SearchIssuesTool::new(&settings(&server)));
        let result = run(tool, json!({"query": "project = OPS"})).await;
        let issues: Vec<Value> = serde_json::from_str(&result.output()).unwrap();
        assert_eq!(issues[0]["key"], "OPS-1");
        assert_eq!(issues[0]["status"], "Open");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn edit_missing_issue_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/rest/api/2/issue/OPS-404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tool = Arc::new(EditIssueTool::new(&settings(&server)));
        let result = run(tool, json!({"key": "OPS-404", "fields": {"summary": "x"}})).await;
        assert_eq!(
            result,
            ExecutionResult::failed(FailureReason::NotFound {
                resource: "issue OPS-404".into()
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_projects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"key": "OPS", "name": "Operations", "id": "1"}
            ])))
            .mount(&server)
            .await;

        let tool = Arc::new(ListProjectsTool::new(&settings(&server)));
        let result = run(tool, json!({})).await;
        assert_eq!(result.output(), r#"[{"key":"OPS","name":"Operations"}]"#);
    }

    #[test]
    fn missing_credentials_are_denied_without_network() {
        let tool = ListProjectsTool::new(&ToolSettings::default());
        assert!(matches!(
            tool.execute(json!({})),
            ExecutionResult::Failure {
                reason: FailureReason::PermissionDenied { .. }
            }
        ));
    }
}
