use crate::{ensure_success, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    cfg: QdrantConfig,
}

impl QdrantClient {
    pub fn new(cfg: QdrantConfig) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    pub fn collection(&self) -> &str {
        &self.cfg.collection
    }

    /// Nearest points to `vector`, best score first, payloads included.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<QdrantSearchResponse, ProviderError> {
        #[derive(Serialize)]
        struct SearchRequest {
            vector: Vec<f32>,
            limit: u64,
            with_payload: bool,
        }
        let url = format!(
            "{}/collections/{}/points/search",
            self.cfg.url.trim_end_matches('/'),
            self.cfg.collection
        );
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let mut builder = self.client.post(url).json(&body);
        if let Some(key) = &self.cfg.api_key {
            builder = builder.header("api-key", key);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let resp = ensure_success(resp).await?;
        let parsed: QdrantSearchResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
pub struct QdrantSearchResponse {
    pub result: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResult {
    pub id: serde_json::Value,
    pub score: f64,
    pub payload: Option<serde_json::Value>,
}

impl SearchResult {
    /// Point ids are either UUID strings or unsigned integers.
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}
