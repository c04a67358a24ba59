//! Chat clients for the supported model backends.

mod client;
mod gemini;
mod message;
mod ollama;
mod retry;
mod selector;

pub use client::{preview, ChatClient, ChatError, LOG_PREVIEW_CHARS};
pub use gemini::{GeminiClient, GeminiPrompt, DEFAULT_GEMINI_BASE_URL};
pub use message::{Message, Role};
pub use ollama::OllamaClient;
pub use retry::{
    retry_rate_limited, RateLimitPolicy, RetryPolicy, DEFAULT_INITIAL_RETRY_DELAY,
    DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_MARKERS,
};
pub use selector::create_client;
