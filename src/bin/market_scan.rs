//! Daily A-share scan
//!
//! Screens every listed stock on today's close and backtests the cheap ones.
//! Run with: cargo run --bin market-scan

use anyhow::Context;
use chrono::Local;
use llm_bridge::config::{load_dotenv, project_root};
use llm_bridge::init_logger;
use llm_bridge::logging::{API_CALLS, MARKET_SCAN};
use llm_bridge::market::{DryRunBacktester, EastmoneyClient, ScanConfig, Scanner};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let root = project_root();
    let _logger = init_logger(MARKET_SCAN).context("failed to set up logging")?;
    // `.env` loading reports under the api_calls subsystem.
    let _config_logger = init_logger(API_CALLS).context("failed to set up logging")?;
    load_dotenv(&root);

    let defaults = ScanConfig::default();
    let max_close: f64 = env::var("SCAN_MAX_CLOSE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.max_close);
    let lookback_days: i64 = env::var("SCAN_LOOKBACK_DAYS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.lookback_days);
    let config = defaults
        .with_max_close(max_close)
        .with_lookback_days(lookback_days);

    let today = Local::now().date_naive();
    println!("📈 A-share scan for {}", today);
    println!("Max close: {}, lookback: {} days\n", config.max_close, config.lookback_days);

    let scanner = Scanner::new(EastmoneyClient::new(), DryRunBacktester::factory(), config);
    let report = scanner.run(today).await;

    println!("\n✅ Scanned {} stocks", report.scanned);
    println!("   No data: {}", report.skipped_no_data);
    println!("   Above price limit: {}", report.skipped_price);
    println!("   Backtested: {}", report.tested);
    println!("   Failed: {}", report.failed);

    Ok(())
}
