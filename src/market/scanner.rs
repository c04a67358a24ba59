//! Screens every listed stock and backtests the cheap ones.

use chrono::{Duration, NaiveDate};

use super::backtest::{BacktestRequest, BacktesterFactory};
use super::{DailyBar, MarketData, Stock};
use crate::logging::{ERROR_ICON, MARKET_SCAN, SUCCESS_ICON};

/// Scanner settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Stocks closing above this price are skipped.
    pub max_close: f64,
    /// Length of the backtest window ending today.
    pub lookback_days: i64,
    pub initial_capital: f64,
    pub num_of_news: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_close: 10.0,
            lookback_days: 90,
            initial_capital: 10_000.0,
            num_of_news: 5,
        }
    }
}

impl ScanConfig {
    pub fn with_max_close(mut self, max_close: f64) -> Self {
        self.max_close = max_close;
        self
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_num_of_news(mut self, count: u32) -> Self {
        self.num_of_news = count;
        self
    }
}

/// What to do with one stock.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanDecision {
    /// No bar for the day.
    NoData,
    /// Closed above the price limit.
    TooExpensive(f64),
    /// Worth backtesting.
    Candidate(DailyBar),
}

impl ScanDecision {
    pub fn screen(bar: Option<DailyBar>, max_close: f64) -> Self {
        match bar {
            None => ScanDecision::NoData,
            Some(bar) if bar.close > max_close => ScanDecision::TooExpensive(bar.close),
            Some(bar) => ScanDecision::Candidate(bar),
        }
    }
}

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub skipped_no_data: usize,
    pub skipped_price: usize,
    pub tested: usize,
    pub failed: usize,
}

/// Walks the market and drives a backtester for each candidate.
pub struct Scanner<M, F> {
    data: M,
    factory: F,
    config: ScanConfig,
}

impl<M: MarketData, F: BacktesterFactory> Scanner<M, F> {
    pub fn new(data: M, factory: F, config: ScanConfig) -> Self {
        Self {
            data,
            factory,
            config,
        }
    }

    /// Backtest request for `ticker` ending on `today`.
    pub fn request_for(&self, ticker: &str, today: NaiveDate) -> BacktestRequest {
        BacktestRequest {
            ticker: ticker.to_string(),
            start_date: today - Duration::days(self.config.lookback_days),
            end_date: today,
            initial_capital: self.config.initial_capital,
            num_of_news: self.config.num_of_news,
        }
    }

    /// Scan every listed stock for `today`.
    ///
    /// A failing listing yields an empty report; failures for a single stock are
    /// counted and the scan moves on.
    pub async fn run(&self, today: NaiveDate) -> ScanReport {
        let mut report = ScanReport::default();

        let stocks = match self.data.list_stocks().await {
            Ok(stocks) => {
                tracing::info!(target: MARKET_SCAN, "Loaded {} A-share stocks", stocks.len());
                stocks
            }
            Err(e) => {
                tracing::error!(target: MARKET_SCAN, "{} Failed to load stock list: {}", ERROR_ICON, e);
                return report;
            }
        };

        for stock in &stocks {
            report.scanned += 1;
            self.scan_stock(stock, today, &mut report).await;
        }

        tracing::info!(target: MARKET_SCAN, "Scan finished: {:?}", report);
        report
    }

    async fn scan_stock(&self, stock: &Stock, today: NaiveDate, report: &mut ScanReport) {
        tracing::info!(target: MARKET_SCAN, "Collecting [{}]{} ...", stock.code, stock.name);

        let bar = match self.data.daily_bar(&stock.code, today).await {
            Ok(bar) => bar,
            Err(e) => {
                tracing::error!(
                    target: MARKET_SCAN,
                    "{} Failed to fetch [{}]{}: {}",
                    ERROR_ICON,
                    stock.code,
                    stock.name,
                    e
                );
                report.failed += 1;
                return;
            }
        };

        match ScanDecision::screen(bar, self.config.max_close) {
            ScanDecision::NoData => {
                tracing::info!(
                    target: MARKET_SCAN,
                    "No trading data for [{}]{} today, skipping",
                    stock.code,
                    stock.name
                );
                report.skipped_no_data += 1;
            }
            ScanDecision::TooExpensive(close) => {
                tracing::info!(
                    target: MARKET_SCAN,
                    "[{}]{} closed at {} above {}, skipping",
                    stock.code,
                    stock.name,
                    close,
                    self.config.max_close
                );
                report.skipped_price += 1;
            }
            ScanDecision::Candidate(bar) => {
                tracing::debug!(target: MARKET_SCAN, "Candidate bar: {:?}", bar);
                let mut backtester = self.factory.create(self.request_for(&stock.code, today));

                let outcome = match backtester.run_backtest().await {
                    Ok(()) => backtester.analyze_performance().await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(performance) => {
                        tracing::info!(
                            target: MARKET_SCAN,
                            "{} Backtested [{}]{}: {:?}",
                            SUCCESS_ICON,
                            stock.code,
                            stock.name,
                            performance.metrics
                        );
                        report.tested += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            target: MARKET_SCAN,
                            "{} Backtest of [{}]{} failed: {}",
                            ERROR_ICON,
                            stock.code,
                            stock.name,
                            e
                        );
                        report.failed += 1;
                    }
                }
            }
        }
    }
}
