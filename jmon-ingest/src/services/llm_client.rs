//! Chat-completion language model client
//!
//! Optional collaborator for the model-backed engines. Errors stay inside the
//! engines, which fall back to fixed defaults.

use async_trait::async_trait;
use jmon_common::config::{is_valid_key, LlmConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Language model errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Language model is not configured (no API key)")]
    NotConfigured,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Empty completion")]
    EmptyResponse,
}

/// Chat-style completion: one system instruction plus one user message in, free text out
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client
pub struct ChatCompletionClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key.clone().filter(|k| is_valid_key(k)),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;

        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        };

        debug!(model = %self.model, endpoint = %self.endpoint, "Requesting chat completion");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(status.as_u16(), error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            base_url: server.url(),
            api_key: api_key.map(str::to_string),
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = ChatCompletionClient::new(&LlmConfig::default()).unwrap();
        assert!(!client.is_configured());

        let err = client.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }

    #[tokio::test]
    async fn test_completion_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "hello"}}]}"#)
            .create_async()
            .await;

        let client = ChatCompletionClient::new(&config_for(&server, Some("sk-test"))).unwrap();
        assert_eq!(client.complete("system", "user").await.unwrap(), "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid key")
            .create_async()
            .await;

        let client = ChatCompletionClient::new(&config_for(&server, Some("sk-bad"))).unwrap();
        let err = client.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError(401, _)));
    }

    #[tokio::test]
    async fn test_empty_choices_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = ChatCompletionClient::new(&config_for(&server, Some("sk-test"))).unwrap();
        let err = client.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
