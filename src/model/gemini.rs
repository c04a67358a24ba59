//! Client for the hosted Gemini `generateContent` API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::client::{preview, ChatClient, ChatError};
use super::message::{Message, Role};
use super::retry::{retry_rate_limited, RateLimitPolicy};
use crate::config::{Platform, ApiKey};
use crate::logging::{API_CALLS, SUCCESS_ICON, WAIT_ICON};

/// Public Gemini API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// A conversation flattened into Gemini's single-prompt shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiPrompt {
    /// `User: ...` / `Assistant: ...` lines in conversation order.
    pub contents: String,
    /// Text of the last non-empty system message.
    pub system_instruction: Option<String>,
}

impl GeminiPrompt {
    /// Flatten `messages`.
    ///
    /// System messages are lifted out of the prompt and the last one wins. User and
    /// assistant turns become labelled lines and the whole prompt is trimmed.
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut contents = String::new();
        let mut system_instruction = None;

        for message in messages {
            match message.role {
                Role::System => system_instruction = Some(message.content.clone()),
                Role::User => {
                    contents.push_str("User: ");
                    contents.push_str(&message.content);
                    contents.push('\n');
                }
                Role::Assistant => {
                    contents.push_str("Assistant: ");
                    contents.push_str(&message.content);
                    contents.push('\n');
                }
            }
        }

        Self {
            contents: contents.trim().to_string(),
            system_instruction: system_instruction.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a GeminiPrompt) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &prompt.contents,
                }],
            }],
            system_instruction: prompt.system_instruction.as_deref().map(|text| SystemInstruction {
                parts: vec![Part { text }],
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
    status: Option<String>,
}

/// Gemini chat client.
///
/// Throttling errors are retried inside each call according to its
/// [`RateLimitPolicy`]; everything else goes straight back to the shared retry loop.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: ApiKey,
    model: String,
    base_url: String,
    rate_limit: RateLimitPolicy,
    client: Client,
}

impl GeminiClient {
    /// Create a new GeminiClient against the public endpoint.
    pub fn new(api_key: impl Into<ApiKey>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            rate_limit: RateLimitPolicy::default(),
            client: Client::new(),
        }
    }

    /// Use a different API endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the throttling retry policy.
    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }

    pub fn rate_limit_policy(&self) -> &RateLimitPolicy {
        &self.rate_limit
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Generate content, retrying throttling errors.
    pub async fn generate_content_with_retry(
        &self,
        prompt: &GeminiPrompt,
    ) -> Result<Option<String>, ChatError> {
        retry_rate_limited(&self.rate_limit, || self.generate_content(prompt)).await
    }

    /// Send a single `generateContent` request.
    async fn generate_content(&self, prompt: &GeminiPrompt) -> Result<Option<String>, ChatError> {
        tracing::info!(target: API_CALLS, "{} Calling Gemini API...", WAIT_ICON);
        tracing::info!(target: API_CALLS, "Request content: {}", preview(&prompt.contents));
        tracing::info!(
            target: API_CALLS,
            "Request config: system_instruction={:?}",
            prompt.system_instruction.as_deref().map(preview)
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&GenerateContentRequest::new(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::error_from_body(status.as_u16(), &body));
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| ChatError::Parse(e.to_string()))?;
        let text = parsed.text();

        tracing::info!(target: API_CALLS, "{} API call succeeded", SUCCESS_ICON);
        tracing::info!(
            target: API_CALLS,
            "Response content: {}",
            text.as_deref().map(preview).unwrap_or_default()
        );
        Ok(text)
    }

    fn error_from_body(status: u16, body: &str) -> ChatError {
        let message = match serde_json::from_str::<GeminiErrorResponse>(body) {
            Ok(GeminiErrorResponse { error }) => match error.status {
                Some(code) => format!("{}: {}", code, error.message),
                None => error.message,
            },
            Err(_) => body.to_string(),
        };
        ChatError::Provider { status, message }
    }
}

#[async_trait]
impl ChatClient for GeminiClient {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn request(&self, messages: &[Message]) -> Result<Option<String>, ChatError> {
        let prompt = GeminiPrompt::from_messages(messages);
        self.generate_content_with_retry(&prompt).await
    }
}
