//! Taiwan Stock Exchange (TWSE) provider.
//!
//! # API Endpoints
//!
//! - Monthly history for one stock:
//!   `https://www.twse.com.tw/exchangeReport/STOCK_DAY?response=json&date={YYYYMM01}&stockNo={code}`
//! - Current listing (last session, all stocks):
//!   `https://openapi.twse.com.tw/v1/exchangeReport/STOCK_DAY_ALL`
//!
//! # Response Format
//!
//! STOCK_DAY answers with a `stat` field ("OK" on success) and a `data` array
//! of string rows:
//! `[ROC date, shares, turnover, open, high, low, close, change, transactions]`.
//! Dates use the ROC calendar (`113/01/02` is 2024-01-02) and numbers carry
//! thousands separators.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{ListedSymbol, RawBar};
use crate::provider::{month_ranges, MarketDataProvider, RateLimit};

const BASE_URL: &str = "https://www.twse.com.tw";
const OPENAPI_URL: &str = "https://openapi.twse.com.tw/v1";
const PROVIDER_ID: &str = "TWSE";

/// STOCK_DAY_ALL only covers the main board.
const MARKETS: &[&str] = &["tse"];

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `stat` fragments TWSE uses when a month simply has no rows.
const NO_DATA_MARKERS: &[&str] = &["沒有符合條件", "查詢日期小於", "查詢日期大於"];

/// Offset between the ROC (Minguo) calendar year and the Gregorian year.
const ROC_YEAR_OFFSET: i32 = 1911;

/// Response from the STOCK_DAY endpoint.
#[derive(Debug, Deserialize)]
struct StockDayResponse {
    stat: String,
    #[serde(default)]
    data: Option<Vec<Vec<serde_json::Value>>>,
}

/// One entry of the STOCK_DAY_ALL open data feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DailyAllEntry {
    code: String,
    #[serde(default)]
    name: Option<String>,
}

/// TWSE provider for listed (上市) equities.
pub struct TwseProvider {
    client: Client,
    base_url: String,
    openapi_url: String,
}

impl TwseProvider {
    pub fn new() -> Self {
        Self::with_base_urls(BASE_URL, OPENAPI_URL)
    }

    /// Point the provider at alternative hosts (mirrors, local fixtures).
    pub fn with_base_urls(base_url: impl Into<String>, openapi_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("stockbase/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            openapi_url: openapi_url.into(),
        }
    }

    async fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<String, MarketDataError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MarketDataError::Unauthorized {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }
        if status.is_server_error() {
            return Err(MarketDataError::ServerError {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP error: {}", status),
            });
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, e))
    }
}

impl Default for TwseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for TwseProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        // TWSE blocks clients that exceed roughly three requests per five seconds.
        RateLimit {
            requests_per_minute: 30,
            burst: 3,
            max_concurrency: 2,
        }
    }

    fn request_ranges(&self, start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
        month_ranges(start, end)
    }

    fn markets(&self) -> Option<&'static [&'static str]> {
        Some(MARKETS)
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, MarketDataError> {
        let url = format!("{}/exchangeReport/STOCK_DAY", self.base_url);
        let mut rows = Vec::new();

        // STOCK_DAY answers one month per request.
        for (from, to) in month_ranges(start, end) {
            let query = [
                ("response", "json".to_string()),
                ("date", from.format("%Y%m01").to_string()),
                ("stockNo", symbol.to_string()),
            ];
            let body = self.fetch(&url, &query).await?;
            let month_rows = parse_stock_day(&body, from, to)?;
            debug!(
                "TWSE: {} rows for {} in {}",
                month_rows.len(),
                symbol,
                from.format("%Y-%m")
            );
            rows.extend(month_rows);
        }

        Ok(rows)
    }

    async fn list_symbols(&self) -> Result<Vec<ListedSymbol>, MarketDataError> {
        let url = format!("{}/exchangeReport/STOCK_DAY_ALL", self.openapi_url);
        let body = self.fetch(&url, &[]).await?;
        parse_daily_all(&body)
    }
}

/// Parse an ROC calendar date such as `113/01/02`.
fn parse_roc_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value.trim().split('/');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let day: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year + ROC_YEAR_OFFSET, month, day)
}

fn cell(row: &[serde_json::Value], index: usize) -> Option<String> {
    row.get(index).map(|value| match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Turn a STOCK_DAY payload into raw rows restricted to `[start, end]`.
///
/// Dates are rewritten to ISO form. Rows whose date cannot be read are kept
/// verbatim so the ingestion layer can count them as invalid.
fn parse_stock_day(
    body: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<RawBar>, MarketDataError> {
    let response: StockDayResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::MalformedResponse {
            provider: PROVIDER_ID.to_string(),
            message: e.to_string(),
        })?;

    if response.stat != "OK" {
        if NO_DATA_MARKERS.iter().any(|m| response.stat.contains(m)) {
            return Ok(Vec::new());
        }
        return Err(MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: response.stat,
        });
    }

    let mut rows = Vec::new();
    for row in response.data.unwrap_or_default() {
        let raw_date = cell(&row, 0).unwrap_or_default();
        let date = match parse_roc_date(&raw_date) {
            Some(d) if d < start || d > end => continue,
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => raw_date,
        };

        rows.push(RawBar {
            date,
            open: cell(&row, 3),
            high: cell(&row, 4),
            low: cell(&row, 5),
            close: cell(&row, 6),
            volume: cell(&row, 1),
        });
    }

    Ok(rows)
}

fn parse_daily_all(body: &str) -> Result<Vec<ListedSymbol>, MarketDataError> {
    let entries: Vec<DailyAllEntry> =
        serde_json::from_str(body).map_err(|e| MarketDataError::MalformedResponse {
            provider: PROVIDER_ID.to_string(),
            message: e.to_string(),
        })?;

    Ok(entries
        .into_iter()
        .filter(|e| !e.code.trim().is_empty())
        .map(|e| ListedSymbol {
            code: e.code.trim().to_string(),
            name: e.name.map(|n| n.trim().to_string()),
            market: Some("tse".to_string()),
            industry: None,
            security_type: None,
            listed_since: None,
        })
        .collect())
}
