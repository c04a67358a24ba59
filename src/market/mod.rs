//! Daily A-share screening that feeds cheap stocks into a backtester.
//!
//! The market-data source and the backtester are collaborators behind the
//! [`MarketData`] and [`Backtester`] traits; [`EastmoneyClient`] is the bundled
//! market-data implementation.

mod backtest;
mod eastmoney;
mod scanner;

pub use backtest::{
    BacktestRequest, Backtester, BacktesterFactory, DryRunBacktester, PerformanceReport,
};
pub use eastmoney::{secid, EastmoneyClient, DEFAULT_KLINE_URL, DEFAULT_LIST_URL};
pub use scanner::{ScanConfig, ScanDecision, ScanReport, Scanner};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market scanner errors.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Market data API error: {0}")]
    Api(String),
    #[error("Failed to parse market data: {0}")]
    Parse(String),
    #[error("Backtest failed: {0}")]
    Backtest(String),
}

/// A listed stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub code: String,
    pub name: String,
}

/// One daily OHLC bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Traded volume in lots.
    pub volume: f64,
    /// Traded amount in CNY.
    pub amount: f64,
}

/// Source of stock listings and daily bars.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Every listed stock.
    async fn list_stocks(&self) -> Result<Vec<Stock>, MarketError>;

    /// The bar for `code` on `date`, or `None` if it did not trade.
    async fn daily_bar(&self, code: &str, date: NaiveDate) -> Result<Option<DailyBar>, MarketError>;
}
