//! Builds the single chat client for the configured platform.

use std::sync::Arc;

use super::client::ChatClient;
use super::gemini::GeminiClient;
use super::ollama::OllamaClient;
use crate::config::ClientConfig;
use crate::logging::{API_CALLS, SUCCESS_ICON};

/// Build the client selected by `config`.
///
/// The entry point calls this once and hands the returned instance to everything that
/// needs chat completions.
pub fn create_client(config: &ClientConfig) -> Arc<dyn ChatClient> {
    let client: Arc<dyn ChatClient> = match config {
        ClientConfig::Ollama { address, model } => Arc::new(OllamaClient::new(address, model)),
        ClientConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            let client = GeminiClient::new(api_key.clone(), model);
            match base_url {
                Some(url) => Arc::new(client.with_base_url(url)),
                None => Arc::new(client),
            }
        }
    };

    tracing::info!(
        target: API_CALLS,
        "{} Using {} backend with model {}",
        SUCCESS_ICON,
        client.platform(),
        client.model_name()
    );
    client
}
