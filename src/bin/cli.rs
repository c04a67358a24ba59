//! LLM Bridge - chat with the configured model backend
//!
//! This is the CLI entry point for the llm-chat tool.
//! Run with: cargo run --bin llm-chat -- "your question"

use anyhow::Context;
use llm_bridge::config::{load_dotenv, project_root};
use llm_bridge::logging::API_CALLS;
use llm_bridge::model::{DEFAULT_INITIAL_RETRY_DELAY, DEFAULT_MAX_RETRIES};
use llm_bridge::{create_client, init_logger, ChatClient, ClientConfig, Message, RetryPolicy};
use std::env;
use std::io::{self, BufRead, Write};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let root = project_root();
    let _logger = init_logger(API_CALLS).context("failed to set up logging")?;
    load_dotenv(&root);

    let args: Vec<String> = env::args().collect();

    let config = ClientConfig::from_env().context("invalid model configuration")?;

    // Get retry configuration from environment
    let max_retries: u32 = env::var("MODEL_MAX_RETRIES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_RETRIES);
    let retry_delay = env::var("MODEL_RETRY_DELAY")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(DEFAULT_INITIAL_RETRY_DELAY);
    let policy = RetryPolicy::new(max_retries, retry_delay);

    let system_prompt = env::var("CHAT_SYSTEM_PROMPT").ok().filter(|s| !s.is_empty());

    let client = create_client(&config);

    println!("🤖 LLM Bridge");
    println!("================================================");
    println!("Platform: {}", client.platform());
    println!("Model: {}", client.model_name());
    println!("Retry: max {} attempts, {:?} initial delay", max_retries, retry_delay);
    println!("================================================\n");

    let mut history: Vec<Message> = system_prompt.into_iter().map(Message::system).collect();

    if args.len() > 1 {
        let prompt = args[1..].join(" ");
        history.push(Message::user(prompt));
        match client.get_chat_completion(&history, &policy).await {
            Some(answer) => println!("{}", answer),
            None => anyhow::bail!("no answer available, see the api_calls log for details"),
        }
        return Ok(());
    }

    // Interactive mode
    println!("Interactive mode. Type your message and press Enter.");
    println!("Type 'reset' to clear the conversation, 'quit' or 'exit' to exit.\n");

    let base_len = history.len();
    let stdin = io::stdin();
    loop {
        print!("📝 You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "exit" {
            println!("Goodbye! 👋");
            break;
        }

        if input == "reset" {
            history.truncate(base_len);
            println!("🔄 Conversation cleared\n");
            continue;
        }

        history.push(Message::user(input));
        match client.get_chat_completion(&history, &policy).await {
            Some(answer) => {
                println!("\n🤖 {}\n", answer);
                history.push(Message::assistant(answer));
            }
            None => {
                eprintln!("\n❌ No answer available\n");
                history.pop();
            }
        }
    }

    Ok(())
}
