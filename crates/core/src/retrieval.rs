//! Nearest-neighbor lookup over previously labeled snippets.

use providers::qdrant::{QdrantClient, SearchResult};
use providers::{EmbeddingProvider, ProviderError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Parallel arrays as the index returns them, closest first. Fields are kept in
/// alphabetical order so the serialized form is key-sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNeighbors {
    pub categories: Vec<String>,
    pub distances: Vec<f64>,
    pub ids: Vec<String>,
}

#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    async fn query(&self, text: &str, k: usize) -> Result<RawNeighbors, ProviderError>;
}

/// Embeds the snippet and searches a Qdrant collection whose payloads carry a
/// `category` key.
pub struct VectorIndexRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: QdrantClient,
}

impl VectorIndexRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: QdrantClient) -> Self {
        Self { embedder, index }
    }
}

#[async_trait::async_trait]
impl Retriever for VectorIndexRetriever {
    async fn query(&self, text: &str, k: usize) -> Result<RawNeighbors, ProviderError> {
        let resp = self.embedder.embed(&[text.to_string()]).await?;
        let vector = resp.vectors.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse("embedding provider returned no vector".into())
        })?;
        let hits = self.index.search(vector, k as u64).await?;
        debug!(collection = self.index.collection(), hits = hits.result.len(), "vector search");
        neighbors_from_hits(&hits.result)
    }
}

/// Cosine scores become distances (`1 - score`, floored at zero).
pub(crate) fn neighbors_from_hits(hits: &[SearchResult]) -> Result<RawNeighbors, ProviderError> {
    let mut out = RawNeighbors::default();
    for hit in hits {
        let id = hit.id_string();
        let category = hit.payload_str("category").ok_or_else(|| {
            ProviderError::MalformedResponse(format!("point {} has no category payload", id))
        })?;
        out.categories.push(category.to_string());
        out.distances.push((1.0 - hit.score).max(0.0));
        out.ids.push(id);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: serde_json::Value, score: f64, payload: serde_json::Value) -> SearchResult {
        SearchResult {
            id,
            score,
            payload: Some(payload),
        }
    }

    #[test]
    fn hits_become_parallel_arrays() {
        let hits = vec![
            hit(json!("a1"), 0.75, json!({"category": "RSA"})),
            hit(json!(7), 0.5, json!({"category": "AES"})),
            hit(json!("c3"), 1.2, json!({"category": "DES"})),
        ];
        let raw = neighbors_from_hits(&hits).unwrap();
        assert_eq!(raw.ids, vec!["a1", "7", "c3"]);
        assert_eq!(raw.categories, vec!["RSA", "AES", "DES"]);
        assert_eq!(raw.distances, vec![0.25, 0.5, 0.0]);
    }

    #[test]
    fn missing_category_is_malformed() {
        let hits = vec![hit(json!("a1"), 0.9, json!({"path": "x.py"}))];
        assert!(matches!(
            neighbors_from_hits(&hits),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn serialized_keys_are_sorted() {
        let raw = RawNeighbors {
            categories: vec!["RSA".into()],
            distances: vec![0.5],
            ids: vec!["a".into()],
        };
        let text = serde_json::to_string(&raw).unwrap();
        let c = text.find("categories").unwrap();
        let d = text.find("distances").unwrap();
        let i = text.find("ids").unwrap();
        assert!(c < d && d < i);
    }
}
