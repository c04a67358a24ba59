//! Configuration module for the LLM bridge.

mod client;
mod paths;

pub use client::{
    ApiKey, ClientConfig, ConfigError, Platform, AI_PLATFORM, GEMINI_API_KEY, GEMINI_BASE_URL,
    GEMINI_MODEL, OLLAMA_ADDRESS, OLLAMA_MODEL,
};
pub use paths::{env_file, load_dotenv, logs_dir, project_root, ROOT_ENV_VAR};
