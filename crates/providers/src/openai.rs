use crate::{
    ensure_success, ChatMessage, ChatReply, EmbedResponse, EmbeddingProvider, GenerateOptions,
    LlmProvider, ProviderError, ToolSpec,
};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessageResp,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
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
    /// JSON-encoded object, as the chat completions API sends it.
    arguments: String,
}

fn into_reply(parsed: ChatApiResponse) -> Result<ChatReply, ProviderError> {
    let message = match parsed.choices.into_iter().next() {
        Some(choice) => choice.message,
        None => {
            return Ok(ChatReply::Text {
                content: String::new(),
            })
        }
    };
    if let Some(call) = message.tool_calls.into_iter().next() {
        let arguments = serde_json::from_str(&call.function.arguments).map_err(|e| {
            ProviderError::MalformedResponse(format!("tool arguments for {}: {}", call.function.name, e))
        })?;
        return Ok(ChatReply::ToolInvoked {
            name: call.function.name,
            arguments,
        });
    }
    Ok(ChatReply::Text {
        content: message.content.unwrap_or_default(),
    })
}

impl OpenAiProvider {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        opts: GenerateOptions,
    ) -> Result<ChatReply, ProviderError> {
        #[derive(serde::Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            #[serde(skip_serializing_if = "Option::is_none")]
            tools: Option<&'a [ToolSpec]>,
            temperature: f32,
        }

        let body = ChatRequest {
            model: &self.cfg.chat_model,
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            temperature: opts.temperature,
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.cfg.base_url))
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let resp = ensure_success(resp).await?;

        let parsed: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        into_reply(parsed)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        #[derive(serde::Serialize)]
        struct EmbedRequest<'a> {
            model: &'a str,
            input: &'a [String],
        }

        let body = EmbedRequest {
            model: &self.cfg.embedding_model,
            input: texts,
        };

        let resp = self
            .client
            .post(format!("{}/v1/embeddings", self.cfg.base_url))
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let resp = ensure_success(resp).await?;

        let parsed: EmbeddingApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Ok(EmbedResponse {
            vectors: parsed.data.into_iter().map(|d| d.embedding).collect(),
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(
        &self,
        prompt: &str,
        opts: GenerateOptions,
    ) -> Result<String, ProviderError> {
        // No plain completion endpoint here; a single user turn is equivalent.
        match self
            .chat_completion(&[ChatMessage::user(prompt)], &[], opts)
            .await?
        {
            ChatReply::Text { content } => Ok(content),
            ChatReply::ToolInvoked { name, .. } => Err(ProviderError::MalformedResponse(
                format!("unexpected tool call {} without tools offered", name),
            )),
        }
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        opts: GenerateOptions,
    ) -> Result<ChatReply, ProviderError> {
        self.chat_completion(messages, tools, opts).await
    }
}
