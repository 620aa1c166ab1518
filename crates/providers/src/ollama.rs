use crate::{
    ensure_success, ChatMessage, ChatReply, EmbedResponse, EmbeddingProvider, GenerateOptions,
    LlmProvider, ProviderError, ToolSpec,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
}

#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    cfg: Arc<OllamaConfig>,
}

impl OllamaProvider {
    pub fn new(cfg: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let resp = self
            .client
            .post(format!("{}{}", self.cfg.base_url.trim_end_matches('/'), path))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let resp = ensure_success(resp).await?;
        resp.json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

impl From<GenerateOptions> for OllamaOptions {
    fn from(opts: GenerateOptions) -> Self {
        Self {
            temperature: opts.temperature,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingApiResponse {
    embedding: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct GenerateApiResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatApiResponse {
    message: ChatMessageResp,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResp {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Map<String, serde_json::Value>,
}

/// Ollama hands tool arguments back as a JSON object; the first call wins.
pub(crate) fn into_reply(parsed: ChatApiResponse) -> ChatReply {
    match parsed.message.tool_calls.into_iter().next() {
        Some(call) => ChatReply::ToolInvoked {
            name: call.function.name,
            arguments: call.function.arguments,
        },
        None => ChatReply::Text {
            content: parsed.message.content,
        },
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        #[derive(Serialize)]
        struct EmbedRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            options: OllamaOptions,
        }

        // The embeddings endpoint takes one prompt per request.
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let body = EmbedRequest {
                model: &self.cfg.embedding_model,
                prompt: text,
                options: GenerateOptions::default().into(),
            };
            let parsed: EmbeddingApiResponse = self.post("/api/embeddings", &body).await?;
            let vector = parsed.embedding.ok_or_else(|| {
                ProviderError::MalformedResponse("could not get embedding".to_string())
            })?;
            vectors.push(vector);
        }
        Ok(EmbedResponse { vectors })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        prompt: &str,
        opts: GenerateOptions,
    ) -> Result<String, ProviderError> {
        #[derive(Serialize)]
        struct GenerateRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
            options: OllamaOptions,
        }

        let body = GenerateRequest {
            model: &self.cfg.chat_model,
            prompt,
            stream: false,
            options: opts.into(),
        };
        debug!(model = %self.cfg.chat_model, "ollama generate");
        let parsed: GenerateApiResponse = self.post("/api/generate", &body).await?;
        Ok(parsed.response)
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        opts: GenerateOptions,
    ) -> Result<ChatReply, ProviderError> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            tools: &'a [ToolSpec],
            stream: bool,
            options: OllamaOptions,
        }

        let body = ChatRequest {
            model: &self.cfg.chat_model,
            messages,
            tools,
            stream: false,
            options: opts.into(),
        };
        debug!(model = %self.cfg.chat_model, tools = tools.len(), "ollama chat");
        let parsed: ChatApiResponse = self.post("/api/chat", &body).await?;
        Ok(into_reply(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_becomes_tool_invoked() {
        let parsed: ChatApiResponse = serde_json::from_value(json!({
            "model": "llama3.1",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "function": {
                        "name": "identify_algorithm",
                        "arguments": {"algorithm_name": "RSA", "code": "x", "description": "why"}
                    }
                }]
            },
            "done": true
        }))
        .unwrap();
        match into_reply(parsed) {
            ChatReply::ToolInvoked { name, arguments } => {
                assert_eq!(name, "identify_algorithm");
                assert_eq!(arguments["algorithm_name"], "RSA");
                assert_eq!(arguments["description"], "why");
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn plain_message_becomes_text() {
        let parsed: ChatApiResponse = serde_json::from_value(json!({
            "message": {"role": "assistant", "content": "AES"}
        }))
        .unwrap();
        assert_eq!(
            into_reply(parsed),
            ChatReply::Text {
                content: "AES".into()
            }
        );
    }
}
