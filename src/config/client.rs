//! Backend selection read from the environment.

use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::logging::{API_CALLS, ERROR_ICON};

pub const AI_PLATFORM: &str = "AI_PLATFORM";
pub const OLLAMA_ADDRESS: &str = "OLLAMA_ADDRESS";
pub const OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";

/// Configuration errors. All of them abort startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not found in environment variables")]
    MissingVar(&'static str),
    #[error("AI_PLATFORM not found in environment variables (expected \"ollama\" or \"gemini\")")]
    MissingPlatform,
    #[error("unsupported AI_PLATFORM {0:?} (expected \"ollama\" or \"gemini\")")]
    UnknownPlatform(String),
}

/// Gemini API key. Only the request builder reads the raw value; `Debug` hides it so
/// configs can be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, for the `x-goog-api-key` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<{} chars hidden>)", self.0.chars().count())
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Supported chat backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Local Ollama server.
    Ollama,
    /// Hosted Gemini API.
    Gemini,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ollama => "ollama",
            Platform::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Platform::Ollama),
            "gemini" => Ok(Platform::Gemini),
            _ => Err(ConfigError::UnknownPlatform(s.to_string())),
        }
    }
}

/// Which backend to build and how to reach it. Read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientConfig {
    Ollama {
        address: String,
        model: String,
    },
    Gemini {
        api_key: ApiKey,
        model: String,
        /// Endpoint override, mostly for proxies and tests.
        base_url: Option<String>,
    },
}

impl ClientConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// Only the variables of the selected platform are consulted.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let platform = match lookup(AI_PLATFORM).filter(|v| !v.trim().is_empty()) {
            Some(value) => value.parse::<Platform>(),
            None => Err(ConfigError::MissingPlatform),
        }
        .inspect_err(|e| tracing::error!(target: API_CALLS, "{} {}", ERROR_ICON, e))?;

        match platform {
            Platform::Ollama => Ok(ClientConfig::Ollama {
                address: required(&lookup, OLLAMA_ADDRESS)?,
                model: required(&lookup, OLLAMA_MODEL)?,
            }),
            Platform::Gemini => Ok(ClientConfig::Gemini {
                api_key: required(&lookup, GEMINI_API_KEY)?.into(),
                model: required(&lookup, GEMINI_MODEL)?,
                base_url: lookup(GEMINI_BASE_URL).filter(|v| !v.is_empty()),
            }),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            ClientConfig::Ollama { .. } => Platform::Ollama,
            ClientConfig::Gemini { .. } => Platform::Gemini,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ClientConfig::Ollama { model, .. } | ClientConfig::Gemini { model, .. } => model,
        }
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.is_empty()) {
        Some(value) => Ok(value),
        None => {
            tracing::error!(target: API_CALLS, "{} {} not found in environment variables", ERROR_ICON, key);
            Err(ConfigError::MissingVar(key))
        }
    }
}
