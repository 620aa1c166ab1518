//! Provider abstractions for LLMs, embeddings and the vector index.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod ollama;
pub mod openai;
pub mod osv;
pub mod qdrant;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("status {status} body {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

/// Sampling options shared by every completion call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { temperature: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A callable function offered to the model, in the `{"type": "function"}` shape
/// both Ollama and OpenAI-compatible servers accept.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            kind: "function",
            function: FunctionSpec {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// What a chat call came back with: either the model invoked one of the
/// offered tools, or it answered in plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    ToolInvoked {
        name: String,
        arguments: serde_json::Map<String, serde_json::Value>,
    },
    Text {
        content: String,
    },
}

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-prompt completion returning the raw generated text.
    async fn generate(&self, prompt: &str, opts: GenerateOptions)
        -> Result<String, ProviderError>;

    /// Chat completion offering `tools` to the model.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        opts: GenerateOptions,
    ) -> Result<ChatReply, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    embeddings: HashMap<String, Arc<dyn EmbeddingProvider>>,
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    pub preferred_embedding: Option<String>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, name: &str, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings.insert(name.to_string(), provider);
        self
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_embedding(mut self, name: &str) -> Self {
        self.preferred_embedding = Some(name.to_string());
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn embedding(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_embedding.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no embedding provider configured".into())
            })?;
        self.embeddings
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        self.llms
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}

/// Turns a non-2xx response into [`ProviderError::Status`], keeping the body for the log.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
    Err(ProviderError::Status {
        status: status.as_u16(),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait::async_trait]
    impl LlmProvider for Fixed {
        async fn generate(
            &self,
            _prompt: &str,
            _opts: GenerateOptions,
        ) -> Result<String, ProviderError> {
            Ok("RSA".into())
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
            _opts: GenerateOptions,
        ) -> Result<ChatReply, ProviderError> {
            Ok(ChatReply::Text {
                content: "RSA".into(),
            })
        }
    }

    #[test]
    fn registry_falls_back_to_preferred_llm() {
        let reg = ProviderRegistry::new()
            .with_llm("fixed", Arc::new(Fixed))
            .set_preferred_llm("fixed");
        assert!(reg.llm(None).is_ok());
        assert!(reg.llm(Some("fixed")).is_ok());
        assert!(matches!(
            reg.llm(Some("missing")),
            Err(ProviderError::UnknownProvider(name)) if name == "missing"
        ));
    }

    #[test]
    fn registry_without_preference_reports_unknown() {
        let reg = ProviderRegistry::new();
        assert!(matches!(
            reg.embedding(None),
            Err(ProviderError::UnknownProvider(_))
        ));
    }

    #[test]
    fn tool_spec_serializes_as_function() {
        let tool = ToolSpec::function(
            "identify_algorithm",
            "names an algorithm",
            serde_json::json!({"type": "object"}),
        );
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "identify_algorithm");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }
}
