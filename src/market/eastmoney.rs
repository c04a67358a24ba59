//! Eastmoney push2 market-data client.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use super::{DailyBar, MarketData, MarketError, Stock};
use crate::logging::MARKET_SCAN;

/// Stock list endpoint.
pub const DEFAULT_LIST_URL: &str = "https://82.push2.eastmoney.com/api/qt/clist/get";

/// Daily k-line endpoint.
pub const DEFAULT_KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";

/// Shanghai and Shenzhen main boards, ChiNext and STAR.
const A_SHARE_FILTER: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";

const PAGE_SIZE: usize = 100;

/// Eastmoney security id: `1.` for Shanghai codes (leading `6`), `0.` otherwise.
pub fn secid(code: &str) -> String {
    let market = if code.starts_with('6') { 1 } else { 0 };
    format!("{}.{}", market, code)
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: Option<ListData>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    total: usize,
    #[serde(default)]
    diff: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    f12: String,
    f14: String,
}

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

/// Parse a `date,open,close,high,low,volume,amount,...` k-line record.
fn parse_kline(line: &str) -> Result<DailyBar, MarketError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 7 {
        return Err(MarketError::Parse(format!("short k-line record: {}", line)));
    }

    let number = |i: usize| {
        fields[i]
            .parse::<f64>()
            .map_err(|e| MarketError::Parse(format!("field {} of {:?}: {}", i, line, e)))
    };

    Ok(DailyBar {
        date: NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
            .map_err(|e| MarketError::Parse(format!("date of {:?}: {}", line, e)))?,
        open: number(1)?,
        close: number(2)?,
        high: number(3)?,
        low: number(4)?,
        volume: number(5)?,
        amount: number(6)?,
    })
}

/// Client for Eastmoney's public quote API.
#[derive(Debug, Clone)]
pub struct EastmoneyClient {
    list_url: String,
    kline_url: String,
    client: Client,
}

impl Default for EastmoneyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EastmoneyClient {
    pub fn new() -> Self {
        Self::with_endpoints(DEFAULT_LIST_URL, DEFAULT_KLINE_URL)
    }

    /// Use custom endpoints.
    pub fn with_endpoints(list_url: impl Into<String>, kline_url: impl Into<String>) -> Self {
        Self {
            list_url: list_url.into(),
            kline_url: kline_url.into(),
            client: Client::new(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Api(format!("HTTP {}: {}", status, body)));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MarketError::Parse(e.to_string()))
    }

    async fn list_page(&self, page: usize) -> Result<Option<ListData>, MarketError> {
        let query = [
            ("pn", page.to_string()),
            ("pz", PAGE_SIZE.to_string()),
            ("po", "1".to_string()),
            ("np", "1".to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fid", "f12".to_string()),
            ("fs", A_SHARE_FILTER.to_string()),
            ("fields", "f12,f14".to_string()),
        ];
        let response: ListResponse = self.get_json(&self.list_url, &query).await?;
        Ok(response.data)
    }
}

#[async_trait]
impl MarketData for EastmoneyClient {
    async fn list_stocks(&self) -> Result<Vec<Stock>, MarketError> {
        let mut stocks = Vec::new();
        let mut page = 1;

        loop {
            let Some(data) = self.list_page(page).await? else {
                break;
            };
            if data.diff.is_empty() {
                break;
            }
            stocks.extend(data.diff.into_iter().map(|e| Stock {
                code: e.f12,
                name: e.f14,
            }));
            if stocks.len() >= data.total {
                break;
            }
            page += 1;
        }

        tracing::info!(target: MARKET_SCAN, "Fetched {} A-share listings", stocks.len());
        Ok(stocks)
    }

    async fn daily_bar(&self, code: &str, date: NaiveDate) -> Result<Option<DailyBar>, MarketError> {
        let day = date.format("%Y%m%d").to_string();
        let query = [
            ("secid", secid(code)),
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57".to_string()),
            ("klt", "101".to_string()),
            ("fqt", "0".to_string()),
            ("beg", day.clone()),
            ("end", day),
        ];
        let response: KlineResponse = self.get_json(&self.kline_url, &query).await?;

        response
            .data
            .and_then(|d| d.klines.into_iter().next())
            .map(|line| parse_kline(&line))
            .transpose()
    }
}
