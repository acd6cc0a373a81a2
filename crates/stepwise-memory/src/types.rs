use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored memory with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: Uuid,
    /// Scope the entry belongs to, usually `agent:{id}`
    pub namespace: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

impl VectorEntry {
    pub fn new(namespace: impl Into<String>, content: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            namespace: namespace.into(),
            content: content.into(),
            vector,
            metadata: serde_json::Value::Null,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Nearest-neighbour query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub vector: Vec<f32>,
    /// Restrict results to one namespace
    pub namespace: Option<String>,
    /// Minimum cosine similarity
    pub min_score: f32,
    pub limit: usize,
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self {
            vector: vec![],
            namespace: None,
            min_score: 0.0,
            limit: 5,
        }
    }
}

/// A matched entry and its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub entry: VectorEntry,
    pub score: f32,
}

/// Cosine similarity of two vectors; 0.0 when lengths differ or either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Score `entries` against `query`, keep the best `query.limit`.
pub(crate) fn rank<I>(entries: I, query: &MemoryQuery) -> Vec<SearchResult>
where
    I: IntoIterator<Item = VectorEntry>,
{
    let mut results: Vec<SearchResult> = entries
        .into_iter()
        .filter(|entry| query.namespace.as_ref().is_none_or(|ns| *ns == entry.namespace))
        .map(|entry| {
            let score = cosine_similarity(&query.vector, &entry.vector);
            SearchResult { entry, score }
        })
        .filter(|result| result.score >= query.min_score)
        .collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.entry.created_at.cmp(&a.entry.created_at))
    });
    results.truncate(query.limit);
    results
}
