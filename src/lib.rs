// Copyright 2025 llm-bridge contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # LLM Bridge
//!
//! One chat-completion interface over two interchangeable model backends: the hosted
//! Gemini API and a local Ollama server.
//!
//! The backend is chosen once at startup from the environment (`AI_PLATFORM`), and
//! every call goes through the same retry-with-backoff loop. Callers get back either
//! the answer text or `None`; the details of any failure end up in the logs.
//!
//! The crate also ships a small A-share market scanner that picks cheap stocks for
//! the hedge-fund backtester.
//!
//! ## Example
//!
//! ```rust,no_run
//! use llm_bridge::{create_client, init_logger, ChatClient, ClientConfig, Message, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let _logger = init_logger("api_calls")?;
//!     let config = ClientConfig::from_env()?;
//!     let client = create_client(&config);
//!
//!     let messages = vec![
//!         Message::system("You are a financial analyst."),
//!         Message::user("Summarize today's market in one sentence."),
//!     ];
//!     match client.get_chat_completion(&messages, &RetryPolicy::default()).await {
//!         Some(answer) => println!("{}", answer),
//!         None => println!("No answer available"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod market;
pub mod model;

pub use config::{ClientConfig, ConfigError, Platform};
pub use logging::{init_logger, LoggerError, SubsystemLogger};
pub use model::{create_client, ChatClient, ChatError, Message, RetryPolicy, Role};
