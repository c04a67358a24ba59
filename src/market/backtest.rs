//! Backtester collaborator contract.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MarketError;
use crate::logging::MARKET_SCAN;

/// Everything a backtester is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub num_of_news: u32,
}

/// Metrics produced by [`Backtester::analyze_performance`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub metrics: BTreeMap<String, f64>,
}

/// A backtest for one [`BacktestRequest`]: run it, then analyze it.
#[async_trait]
pub trait Backtester: Send {
    async fn run_backtest(&mut self) -> Result<(), MarketError>;

    async fn analyze_performance(&mut self) -> Result<PerformanceReport, MarketError>;
}

/// Builds a backtester per candidate stock.
pub trait BacktesterFactory: Send + Sync {
    fn create(&self, request: BacktestRequest) -> Box<dyn Backtester>;
}

impl<F> BacktesterFactory for F
where
    F: Fn(BacktestRequest) -> Box<dyn Backtester> + Send + Sync,
{
    fn create(&self, request: BacktestRequest) -> Box<dyn Backtester> {
        self(request)
    }
}

/// Backtester that only logs what it would have run.
#[derive(Debug, Clone)]
pub struct DryRunBacktester {
    request: BacktestRequest,
}

impl DryRunBacktester {
    pub fn new(request: BacktestRequest) -> Self {
        Self { request }
    }

    /// Factory usable with [`Scanner`](super::Scanner).
    pub fn factory() -> impl BacktesterFactory {
        |request: BacktestRequest| Box::new(DryRunBacktester::new(request)) as Box<dyn Backtester>
    }
}

#[async_trait]
impl Backtester for DryRunBacktester {
    async fn run_backtest(&mut self) -> Result<(), MarketError> {
        let r = &self.request;
        tracing::info!(
            target: MARKET_SCAN,
            "Dry run: backtest {} from {} to {} with capital {} and {} news items",
            r.ticker,
            r.start_date,
            r.end_date,
            r.initial_capital,
            r.num_of_news
        );
        Ok(())
    }

    async fn analyze_performance(&mut self) -> Result<PerformanceReport, MarketError> {
        Ok(PerformanceReport::default())
    }
}
