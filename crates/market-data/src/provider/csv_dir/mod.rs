//! Local CSV directory provider.
//!
//! Reads price history exported by earlier downloads or other tools:
//!
//! - `{dir}/{code}_prices.csv` with a `Date,Open,High,Low,Close,Volume` header
//!   (extra columns are ignored)
//! - `{dir}/stock_list.csv` with a `Code,Name,Market,Industry,Type` header,
//!   used as the symbol listing when present

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::MarketDataError;
use crate::models::{ListedSymbol, RawBar};
use crate::provider::{MarketDataProvider, RateLimit};

const PROVIDER_ID: &str = "CSV";
const PRICES_SUFFIX: &str = "_prices.csv";
const STOCK_LIST_FILE: &str = "stock_list.csv";

#[derive(Debug, Deserialize)]
struct PriceRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", default)]
    open: Option<String>,
    #[serde(rename = "High", default)]
    high: Option<String>,
    #[serde(rename = "Low", default)]
    low: Option<String>,
    #[serde(rename = "Close", default)]
    close: Option<String>,
    #[serde(rename = "Volume", default)]
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StockListRecord {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Market", default)]
    market: Option<String>,
    #[serde(rename = "Industry", default)]
    industry: Option<String>,
    #[serde(rename = "Type", default)]
    security_type: Option<String>,
}

/// Provider backed by a directory of CSV files.
pub struct CsvDirectoryProvider {
    root: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prices_path(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{}{}", symbol, PRICES_SUFFIX))
    }

    fn read_error(path: &Path, err: impl std::fmt::Display) -> MarketDataError {
        MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("{}: {}", path.display(), err),
        }
    }

    fn listing_from_stock_list(&self, path: &Path) -> Result<Vec<ListedSymbol>, MarketDataError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| Self::read_error(path, e))?;
        let mut listed = Vec::new();

        for record in reader.deserialize::<StockListRecord>() {
            let record = record.map_err(|e| Self::read_error(path, e))?;
            let code = record.code.trim();
            if code.is_empty() {
                continue;
            }
            listed.push(ListedSymbol {
                code: code.to_string(),
                name: non_empty(record.name),
                market: non_empty(record.market).map(|m| m.to_lowercase()),
                industry: non_empty(record.industry),
                security_type: non_empty(record.security_type),
                listed_since: None,
            });
        }

        Ok(listed)
    }

    fn listing_from_price_files(&self) -> Result<Vec<ListedSymbol>, MarketDataError> {
        let entries = fs::read_dir(&self.root).map_err(|e| Self::read_error(&self.root, e))?;
        let mut listed = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| Self::read_error(&self.root, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(code) = name.strip_suffix(PRICES_SUFFIX) {
                if !code.is_empty() {
                    listed.push(ListedSymbol::new(code));
                }
            }
        }

        listed.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(listed)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Best-effort date read used only to honor the requested range.
fn loose_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

#[async_trait]
impl MarketDataProvider for CsvDirectoryProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::unlimited()
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, MarketDataError> {
        let path = self.prices_path(symbol);
        if !path.is_file() {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| Self::read_error(&path, e))?;
        let mut rows = Vec::new();

        for record in reader.deserialize::<PriceRecord>() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    // A broken line is the ingestion layer's concern; keep reading.
                    warn!("{}: skipping unreadable line: {}", path.display(), e);
                    continue;
                }
            };

            if let Some(date) = loose_date(&record.date) {
                if date < start || date > end {
                    continue;
                }
            }

            rows.push(RawBar {
                date: record.date,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }

        debug!("CSV: {} rows for {} from {}", rows.len(), symbol, path.display());
        Ok(rows)
    }

    async fn list_symbols(&self) -> Result<Vec<ListedSymbol>, MarketDataError> {
        let stock_list = self.root.join(STOCK_LIST_FILE);
        if stock_list.is_file() {
            self.listing_from_stock_list(&stock_list)
        } else {
            self.listing_from_price_files()
        }
    }
}
