//! Client for a local Ollama server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::client::{preview, ChatClient, ChatError};
use super::message::Message;
use crate::config::Platform;
use crate::logging::{API_CALLS, SUCCESS_ICON, WAIT_ICON};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

/// Ollama chat client.
///
/// Messages are forwarded as-is to `/api/chat`. There is no provider-specific retry;
/// every error goes back to the shared retry loop.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    address: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    /// Create a new OllamaClient for the server at `address`.
    pub fn new(address: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: Client::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a single chat request.
    async fn send_chat(&self, messages: &[Message]) -> Result<Option<String>, ChatError> {
        tracing::info!(target: API_CALLS, "{} Calling Ollama API...", WAIT_ICON);
        tracing::info!(
            target: API_CALLS,
            "Request content: {}",
            preview(&format!("{:?}", messages))
        );

        let url = format!("{}/api/chat", self.address);
        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ChatError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ChatError::Parse(e.to_string()))?;
        let content = parsed.message.map(|m| m.content).filter(|c| !c.is_empty());

        tracing::info!(target: API_CALLS, "{} API call succeeded", SUCCESS_ICON);
        tracing::info!(
            target: API_CALLS,
            "Response content: {}",
            content.as_deref().map(preview).unwrap_or_default()
        );
        Ok(content)
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    fn platform(&self) -> Platform {
        Platform::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn request(&self, messages: &[Message]) -> Result<Option<String>, ChatError> {
        self.send_chat(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen-test",
            "created_at": "2025-01-01T00:00:00Z",
            "message": { "role": "assistant", "content": content },
            "done": true
        }))
    }

    #[test]
    fn test_address_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/", "qwen-test");
        assert_eq!(client.address(), "http://localhost:11434");
        assert_eq!(client.platform(), Platform::Ollama);
    }

    #[tokio::test]
    async fn test_messages_are_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "model": "qwen-test",
                "messages": [
                    { "role": "system", "content": "S" },
                    { "role": "user", "content": "U1" },
                    { "role": "assistant", "content": "A1" },
                    { "role": "user", "content": "U2" }
                ],
                "stream": false
            })))
            .respond_with(reply("local answer"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), "qwen-test");
        let messages = vec![
            Message::system("S"),
            Message::user("U1"),
            Message::assistant("A1"),
            Message::user("U2"),
        ];
        let result = client
            .get_chat_completion(&messages, &RetryPolicy::default())
            .await;
        assert_eq!(result.as_deref(), Some("local answer"));
    }

    #[tokio::test]
    async fn test_server_error_is_retried_by_outer_loop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'qwen-test' not found" })),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(reply("recovered"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), "qwen-test");
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result = client
            .get_chat_completion(&[Message::user("hi")], &policy)
            .await;
        assert_eq!(result.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn test_error_message_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'qwen-test' not found" })),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), "qwen-test");
        let err = client.request(&[Message::user("hi")]).await.unwrap_err();
        assert_eq!(err.to_string(), "API error (404): model 'qwen-test' not found");
    }

    #[tokio::test]
    async fn test_empty_content_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(reply(""))
            .expect(2)
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), "qwen-test");
        assert_eq!(client.request(&[Message::user("hi")]).await.unwrap(), None);
        let policy = RetryPolicy::new(1, Duration::ZERO);
        assert!(client
            .get_chat_completion(&[Message::user("hi")], &policy)
            .await
            .is_none());
    }
}
