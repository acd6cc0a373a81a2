//! Embedding providers.
//!
//! A process uses one fixed provider for every long-term memory handle so
//! vectors written by one step stay comparable with queries of the next.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::error::{MemoryError, MemoryResult};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;
    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;
    /// Embed a single text string.
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;
    /// Embed a batch of texts (default: sequential).
    async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Needs no network access. Texts sharing words land close together, which
/// is enough for recall within a single agent's history.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
    client: Client,
}

impl OpenAiEmbeddings {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let dimension = if model.contains("3-large") { 3072 } else { 1536 };
        Self {
            api_key: api_key.into(),
            model,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            dimension,
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let body = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let res: EmbedResponse = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        res.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| MemoryError::Embedding("empty embedding response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cosine_similarity;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Find the quarterly report").await.unwrap();
        let b = embedder.embed("find the QUARTERLY report").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HashingEmbedder::DEFAULT_DIMENSION);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_words_score_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("weather in paris").await.unwrap();
        let related = embedder.embed("the weather in paris is mild").await.unwrap();
        let unrelated = embedder.embed("compile rust crates").await.unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert_eq!(embedder.embed("  ").await.unwrap(), vec![0.0; 8]);
    }

    #[tokio::test]
    async fn openai_embeddings_call_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.25, 0.5, 0.75]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbeddings::new("sk-test", None).with_base_url(server.uri());
        assert_eq!(embedder.dimension(), 1536);
        assert_eq!(embedder.embed("hello").await.unwrap(), vec![0.25, 0.5, 0.75]);
    }

    #[tokio::test]
    async fn openai_errors_surface_as_embedding_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbeddings::new("bad", None).with_base_url(server.uri());
        assert!(matches!(
            embedder.embed("hello").await,
            Err(MemoryError::Embedding(_))
        ));
    }
}
