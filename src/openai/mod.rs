#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::PaddleError;
use crate::answer::{ChatMessage, ChatModel};
use crate::config::OpenAiConfig;
use crate::embeddings::Embedder;
use crate::http::{JsonClient, endpoint};

/// Client for the OpenAI embeddings and chat completion endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: JsonClient,
    base_url: Url,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: String) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).context("Invalid OpenAI base URL")?;

        Ok(Self {
            http: JsonClient::new(
                Duration::from_secs(config.timeout_seconds),
                config.retry_attempts,
            ),
            base_url,
            api_key,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }

    #[inline]
    pub fn with_http_client(mut self, http: JsonClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// Embed a single text with the configured embedding model
    #[inline]
    pub fn create_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = endpoint(&self.base_url, "embeddings")?;
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let authorization = self.authorization();
        let response: EmbeddingResponse = self
            .http
            .post_json(&url, &[("Authorization", authorization.as_str())], &request)
            .context("Failed to generate embedding")?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("Embedding response contained no data"))?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    /// Run a chat completion and return the first choice's text
    #[inline]
    pub fn create_chat_completion(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = endpoint(&self.base_url, "chat/completions")?;
        let request = ChatRequest {
            model: &self.chat_model,
            temperature: self.temperature,
            messages,
        };

        let authorization = self.authorization();
        let response: ChatResponse = self
            .http
            .post_json(&url, &[("Authorization", authorization.as_str())], &request)
            .context("Chat completion request failed")?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();
        debug!("Chat completion returned {} characters", content.len());
        Ok(content)
    }
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        self.create_embedding(text)
            .map_err(|e| PaddleError::upstream(&e))
    }
}

impl ChatModel for OpenAiClient {
    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> crate::Result<String> {
        self.create_chat_completion(messages)
            .map_err(|e| PaddleError::upstream(&e))
    }
}
