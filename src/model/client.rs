//! The uniform chat-completion contract shared by every backend.

use async_trait::async_trait;
use std::borrow::Cow;
use thiserror::Error;
use tokio::time::sleep;

use super::message::Message;
use super::retry::RetryPolicy;
use crate::config::Platform;
use crate::logging::{API_CALLS, ERROR_ICON, SUCCESS_ICON, WAIT_ICON};

/// Maximum number of characters of a request or response written to the logs.
pub const LOG_PREVIEW_CHARS: usize = 500;

/// Chat client errors.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("API returned an empty response")]
    EmptyResponse,
    #[error("Max retries exceeded after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<ChatError> },
}

/// Shorten `text` for logging: longer than [`LOG_PREVIEW_CHARS`] characters becomes
/// the prefix followed by `...`, anything else is returned untouched.
pub fn preview(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

/// A chat-completion backend.
///
/// Implementors only provide [`request`](ChatClient::request), a single logical call
/// to their provider including whatever translation and provider-specific retry they
/// need. The outer retry loop and the `Option` boundary are shared.
///
/// # Example
/// ```rust,no_run
/// use llm_bridge::model::{ChatClient, Message, OllamaClient, RetryPolicy};
///
/// # async fn run() {
/// let client = OllamaClient::new("http://localhost:11434", "qwen2.5");
/// let messages = vec![
///     Message::system("You are a terse assistant."),
///     Message::user("Say hi"),
/// ];
/// match client.get_chat_completion(&messages, &RetryPolicy::default()).await {
///     Some(text) => println!("{}", text),
///     None => println!("no answer"),
/// }
/// # }
/// ```
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Which platform this client talks to.
    fn platform(&self) -> Platform;

    /// Model identifier sent to the provider.
    fn model_name(&self) -> &str;

    /// Issue one logical call. `Ok(None)` means the provider answered without text.
    async fn request(&self, messages: &[Message]) -> Result<Option<String>, ChatError>;

    /// Run [`request`](ChatClient::request) under `policy`, keeping the error typed.
    ///
    /// Errors and empty answers both consume an attempt. After the failed attempt with
    /// index `i` the call waits `initial_retry_delay * 2^i`; there is no wait after the
    /// last attempt.
    async fn try_chat_completion(
        &self,
        messages: &[Message],
        policy: &RetryPolicy,
    ) -> Result<String, ChatError> {
        let attempts = policy.attempts();
        tracing::info!(target: API_CALLS, "{} Using model: {}", WAIT_ICON, self.model_name());
        tracing::debug!(
            target: API_CALLS,
            "Messages: {}",
            preview(&format!("{:?}", messages))
        );

        let mut last = ChatError::EmptyResponse;
        for attempt in 0..attempts {
            match self.request(messages).await {
                Ok(Some(text)) => {
                    tracing::debug!(target: API_CALLS, "Raw API response: {}", preview(&text));
                    tracing::info!(
                        target: API_CALLS,
                        "{} Got response on attempt {}/{}",
                        SUCCESS_ICON,
                        attempt + 1,
                        attempts
                    );
                    return Ok(text);
                }
                Ok(None) => {
                    tracing::warn!(
                        target: API_CALLS,
                        "{} Attempt {}/{}: API returned empty response",
                        ERROR_ICON,
                        attempt + 1,
                        attempts
                    );
                    last = ChatError::EmptyResponse;
                }
                Err(e) => {
                    tracing::error!(
                        target: API_CALLS,
                        "{} Attempt {}/{} failed: {}",
                        ERROR_ICON,
                        attempt + 1,
                        attempts,
                        e
                    );
                    last = e;
                }
            }

            if attempt + 1 < attempts {
                let delay = policy.delay_for(attempt);
                tracing::info!(
                    target: API_CALLS,
                    "{} Waiting {:?} before retrying...",
                    WAIT_ICON,
                    delay
                );
                sleep(delay).await;
            }
        }

        tracing::error!(target: API_CALLS, "{} Final error: {}", ERROR_ICON, last);
        Err(ChatError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }

    /// Run a chat completion and collapse any failure into `None`.
    ///
    /// The failure itself is only visible in the logs.
    async fn get_chat_completion(
        &self,
        messages: &[Message],
        policy: &RetryPolicy,
    ) -> Option<String> {
        match self.try_chat_completion(messages, policy).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(
                    target: API_CALLS,
                    "{} get_chat_completion failed: {}",
                    ERROR_ICON,
                    e
                );
                None
            }
        }
    }

    /// [`get_chat_completion`](ChatClient::get_chat_completion) with the default policy.
    async fn chat(&self, messages: &[Message]) -> Option<String> {
        self.get_chat_completion(messages, &RetryPolicy::default())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Replays a fixed list of outcomes, then keeps failing.
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<Option<String>, ChatError>>>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<Option<String>, ChatError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn failing_then(failures: usize, text: &str) -> Self {
            let mut script: Vec<_> = (0..failures)
                .map(|_| Err(ChatError::Parse("boom".to_string())))
                .collect();
            script.push(Ok(Some(text.to_string())));
            Self::new(script)
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        fn platform(&self) -> Platform {
            Platform::Ollama
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn request(&self, _messages: &[Message]) -> Result<Option<String>, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Parse("script exhausted".to_string())))
        }
    }

    fn conversation() -> Vec<Message> {
        vec![Message::system("S"), Message::user("hello")]
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        let text = "a".repeat(LOG_PREVIEW_CHARS);
        assert_eq!(preview(&text), text.as_str());
        assert!(matches!(preview(&text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let text = "b".repeat(LOG_PREVIEW_CHARS + 1);
        let shown = preview(&text);
        assert_eq!(shown.len(), LOG_PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(&shown[..LOG_PREVIEW_CHARS], &text[..LOG_PREVIEW_CHARS]);
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let text = "价".repeat(LOG_PREVIEW_CHARS + 10);
        let shown = preview(&text);
        assert_eq!(shown.chars().count(), LOG_PREVIEW_CHARS + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_makes_one_call() {
        let client = ScriptedClient::failing_then(0, "answer");
        let start = Instant::now();

        let result = client
            .get_chat_completion(&conversation(), &RetryPolicy::default())
            .await;

        assert_eq!(result.as_deref(), Some("answer"));
        assert_eq!(client.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_waits_exponentially() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1));
        let client = ScriptedClient::failing_then(3, "late answer");
        let start = Instant::now();

        let result = client.get_chat_completion(&conversation(), &policy).await;

        assert_eq!(result.as_deref(), Some("late answer"));
        assert_eq!(client.calls(), 4);
        // 1 + 2 + 4
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_fail_returns_none() {
        let policy = RetryPolicy::new(3, Duration::from_millis(200));
        let client = ScriptedClient::new(vec![]);
        let start = Instant::now();

        let result = client.get_chat_completion(&conversation(), &policy).await;

        assert!(result.is_none());
        assert_eq!(client.calls(), 3);
        // No wait after the final attempt: 200ms + 400ms.
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_responses_are_retried_then_reported() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1));
        let client = ScriptedClient::new(vec![Ok(None), Ok(None)]);

        let err = client
            .try_chat_completion(&conversation(), &policy)
            .await
            .unwrap_err();

        assert_eq!(client.calls(), 2);
        match err {
            ChatError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, ChatError::EmptyResponse));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_then_text_succeeds() {
        let client = ScriptedClient::new(vec![Ok(None), Ok(Some("ok".to_string()))]);
        let result = client.chat(&conversation()).await;
        assert_eq!(result.as_deref(), Some("ok"));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_retries_still_attempts_once() {
        let policy = RetryPolicy::default().with_max_retries(0);
        let client = ScriptedClient::failing_then(0, "once");
        let result = client.get_chat_completion(&conversation(), &policy).await;
        assert_eq!(result.as_deref(), Some("once"));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_is_logged_with_index_and_preview() {
        use crate::logging::testing::SharedBuf;
        use crate::logging::LogRouter;
        use tracing_subscriber::prelude::*;

        let dir = tempfile::tempdir().unwrap();
        let router = LogRouter::new();
        let console = SharedBuf::default();
        router.register_with_console(API_CALLS, dir.path(), Box::new(console.clone()));
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(router.clone()));

        let question = "q".repeat(LOG_PREVIEW_CHARS * 2);
        let answer = "a".repeat(LOG_PREVIEW_CHARS * 2);
        let client = ScriptedClient::new(vec![
            Err(ChatError::Parse("boom".to_string())),
            Ok(None),
            Ok(Some(answer.clone())),
        ]);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let result = client
            .get_chat_completion(&[Message::user(question.clone())], &policy)
            .await;
        assert_eq!(result, Some(answer.clone()));

        let log = console.contents();
        assert!(log.contains(" - api_calls - ERROR - ✗ Attempt 1/3 failed: Failed to parse response: boom"));
        assert!(log.contains(" - api_calls - WARNING - ✗ Attempt 2/3: API returned empty response"));
        assert!(log.contains(" - api_calls - INFO - ✓ Got response on attempt 3/3"));
        assert_eq!(log.matches("Waiting").count(), 2);

        let request_line = log.lines().find(|l| l.contains(" - DEBUG - Messages: ")).unwrap();
        assert!(request_line.ends_with("..."));
        assert!(!request_line.contains(&question));
        let response_line = log.lines().find(|l| l.contains("Raw API response: ")).unwrap();
        assert!(response_line.ends_with(&format!("{}...", &answer[..LOG_PREVIEW_CHARS])));
    }

    #[test]
    fn test_chat_client_is_object_safe() {
        fn _assert_object_safe(_: &dyn ChatClient) {}
    }
}
