//! Web search through the Google Custom Search JSON API.

use reqwest::Client;
use serde_json::{Value, json};
use stepwise_core::{ExecutionResult, FailureReason, Tool};

use super::{arg, required_str};
use crate::http::{client, run_async, send_json};
use crate::settings::ToolSettings;

const DEFAULT_RESULTS: u64 = 5;

#[derive(Debug)]
pub struct WebSearchTool {
    base_url: String,
    api_key: Option<String>,
    search_engine_id: Option<String>,
    client: Client,
}

impl WebSearchTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            base_url: settings.google_base_url.trim_end_matches('/').to_string(),
            api_key: settings.google_api_key.clone(),
            search_engine_id: settings.google_search_engine_id.clone(),
            client: client(settings.http_timeout_secs),
        }
    }

    async fn search(&self, api_key: &str, engine: &str, query: &str, num: u64) -> ExecutionResult {
        let request = self
            .client
            .get(format!("{}/customsearch/v1", self.base_url))
            .query(&[
                ("key", api_key.to_string()),
                ("cx", engine.to_string()),
                ("q", query.to_string()),
                ("num", num.to_string()),
            ]);
        let found = match send_json(request, "Google search").await {
            Ok(found) => found,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        let results: Vec<Value> = found
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        json!({
                            "title": item.get("title"),
                            "link": item.get("link"),
                            "snippet": item.get("snippet"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        if results.is_empty() {
            return ExecutionResult::success(format!("No results found for '{}'", query));
        }
        ExecutionResult::success(Value::from(results).to_string())
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "Web Search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with title, link and snippet"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "num_results": {"type": "integer", "description": "Number of results, 1 to 10"}
            },
            "required": ["query"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        let (Some(api_key), Some(engine)) = (&self.api_key, &self.search_engine_id) else {
            return ExecutionResult::failed(FailureReason::PermissionDenied {
                message: "Google API key and search engine id must be configured".to_string(),
            });
        };
        let query = arg!(required_str(&args, "query"));
        let num = args
            .get("num_results")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_RESULTS)
            .clamp(1, 10);
        run_async(|| self.search(api_key, engine, query, num))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test(flavor = "multi_thread")]
    async fn returns_title_link_and_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("q", "rust async"))
            .and(query_param("cx", "engine-1"))
            .and(query_param("num", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"title": "Async Rust", "link": "https://example.com", "snippet": "futures", "kind": "x"}]
            })))
            .mount(&server)
            .await;

        let mut settings = ToolSettings::default().with_google("key-1", "engine-1");
        settings.google_base_url = server.uri();
        let tool: Arc<dyn Tool> = Arc::new(WebSearchTool::new(&settings));
        let result = tokio::task::spawn_blocking(move || tool.execute(json!({"query": "rust async"})))
            .await
            .unwrap();

        let results: Vec<Value> = serde_json::from_str(&result.output()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["link"], "https://example.com");
        assert!(results[0].get("kind").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn quota_errors_are_network_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let mut settings = ToolSettings::default().with_google("key-1", "engine-1");
        settings.google_base_url = server.uri();
        let tool: Arc<dyn Tool> = Arc::new(WebSearchTool::new(&settings));
        let result = tokio::task::spawn_blocking(move || tool.execute(json!({"query": "anything"})))
            .await
            .unwrap();
        assert!(matches!(
            result,
            ExecutionResult::Failure {
                reason: FailureReason::NetworkError { .. }
            }
        ));
    }

    #[test]
    fn unconfigured_search_is_denied() {
        let result = WebSearchTool::new(&ToolSettings::default()).execute(json!({"query": "x"}));
        assert!(matches!(
            result,
            ExecutionResult::Failure {
                reason: FailureReason::PermissionDenied { .. }
            }
        ));
    }
}
