//! Language-model bindings.
//!
//! A [`ModelProvider`] turns the `model` configuration value of an agent into
//! a [`ChatModel`] for one step. The bundled provider talks to any
//! OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat model bound to one model name.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Text of the model's reply to `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> RuntimeResult<String>;
}

/// Builds the chat model an agent's `model` setting names.
pub trait ModelProvider: Send + Sync {
    /// `None` selects the provider default.
    fn bind(&self, model: Option<&str>) -> RuntimeResult<Arc<dyn ChatModel>>;
}

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for one model.
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

impl fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> RuntimeResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RuntimeError::ModelConfig("OpenAI API key cannot be empty".to_string()));
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.into(),
            base_url: OPENAI_API_BASE.to_string(),
            temperature: 0.3,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> RuntimeResult<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RuntimeError::ModelConfig(e.to_string()))?;
        Ok(self)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> RuntimeResult<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        debug!(model = %self.model, messages = messages.len(), "Requesting chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::ModelStatus {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RuntimeError::InvalidReply("no choices in response".to_string()))
    }
}

/// Binds OpenAI-compatible models from process settings.
#[derive(Clone)]
pub struct OpenAiProvider {
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("has_api_key", &self.api_key.is_some())
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: OPENAI_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ModelProvider for OpenAiProvider {
    fn bind(&self, model: Option<&str>) -> RuntimeResult<Arc<dyn ChatModel>> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| RuntimeError::ModelConfig("no OpenAI API key configured".to_string()))?;
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model);
        let chat = OpenAiChatModel::new(api_key, model)?
            .with_base_url(self.base_url.as_str())
            .with_timeout(self.timeout)?;
        Ok(Arc::new(chat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            OpenAiChatModel::new("  ", "gpt-4"),
            Err(RuntimeError::ModelConfig(_))
        ));
    }

    #[test]
    fn provider_without_key_cannot_bind() {
        let provider = OpenAiProvider::new(Some(String::new()));
        assert!(matches!(provider.bind(Some("gpt-4")), Err(RuntimeError::ModelConfig(_))));
    }

    #[test]
    fn provider_falls_back_to_default_model() {
        let provider = OpenAiProvider::new(Some("sk-test".into())).with_default_model("gpt-3.5-turbo");
        assert_eq!(provider.bind(None).unwrap().model_name(), "gpt-3.5-turbo");
        assert_eq!(provider.bind(Some(" ")).unwrap().model_name(), "gpt-3.5-turbo");
        assert_eq!(provider.bind(Some("gpt-4o")).unwrap().model_name(), "gpt-4o");
    }

    #[tokio::test]
    async fn completes_against_chat_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "model": "gpt-4",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new("sk-test", "gpt-4").unwrap().with_base_url(server.uri());
        let reply = model.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(reply, "hello");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new("sk-test", "gpt-4").unwrap().with_base_url(server.uri());
        let err = model.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        match err {
            RuntimeError::ModelStatus { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_are_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new("sk-test", "gpt-4").unwrap().with_base_url(server.uri());
        assert!(matches!(
            model.complete(&[ChatMessage::user("hi")]).await,
            Err(RuntimeError::InvalidReply(_))
        ));
    }
}
