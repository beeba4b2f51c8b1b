//! In-memory stores and a scripted provider shared by the service tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use stockbase_market_data::{
    month_ranges, ListedSymbol, MarketDataError, MarketDataProvider, RateLimit, RawBar,
};

use crate::bars::{Bar, BarStats, BarStore, BarValidator, UpsertOutcome};
use crate::errors::{DatabaseError, IntegrityError, Result};
use crate::maintenance::{BarGap, GapStore, MetadataStore};
use crate::symbols::{MarketCount, Symbol, SymbolMetadata, SymbolStatus, SymbolStore};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// A valid raw row closing at `close`.
pub fn raw_day(date: &str, close: &str) -> RawBar {
    RawBar::ohlcv(date, close, close, close, close, "1000")
}

// =========================================================================
// Bars
// =========================================================================

/// Bars kept in insertion order; `get_bars` does not sort.
#[derive(Clone, Default)]
pub struct MockBarStore {
    bars: Arc<Mutex<Vec<Bar>>>,
    fail_on_write: Arc<Mutex<HashSet<String>>>,
}

impl MockBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bars as-is, bypassing validation.
    pub fn insert_raw(&self, bars: Vec<Bar>) {
        self.bars.lock().unwrap().extend(bars);
    }

    pub fn fail_writes_for(&self, symbol: &str) {
        self.fail_on_write.lock().unwrap().insert(symbol.to_string());
    }

    pub fn all(&self, symbol: &str) -> Vec<Bar> {
        let mut bars: Vec<Bar> = self
            .bars
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.symbol == symbol)
            .cloned()
            .collect();
        bars.sort_by_key(|b| b.date);
        bars
    }
}

#[async_trait]
impl BarStore for MockBarStore {
    async fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<UpsertOutcome> {
        if self.fail_on_write.lock().unwrap().contains(symbol) {
            return Err(DatabaseError::TransactionFailed("database is locked".into()).into());
        }

        let validator = BarValidator::new();
        let reasons: Vec<String> = bars
            .iter()
            .filter_map(|b| validator.validate(b).err())
            .map(|e| e.to_string())
            .collect();
        if !reasons.is_empty() {
            return Err(IntegrityError::RejectedBatch {
                symbol: symbol.to_string(),
                reasons,
            }
            .into());
        }

        let mut stored = self.bars.lock().unwrap();
        let mut outcome = UpsertOutcome::default();
        for bar in bars {
            match stored
                .iter_mut()
                .find(|b| b.symbol == bar.symbol && b.date == bar.date)
            {
                Some(existing) if existing.same_values(bar) => outcome.unchanged += 1,
                Some(existing) => {
                    *existing = bar.clone();
                    outcome.updated += 1;
                }
                None => {
                    stored.push(bar.clone());
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    fn get_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        Ok(self
            .bars
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.symbol == symbol && b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }

    fn latest_bar(&self, symbol: &str) -> Result<Option<Bar>> {
        Ok(self.all(symbol).pop())
    }

    fn first_bar_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        Ok(self.all(symbol).first().map(|b| b.date))
    }

    fn stored_dates(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        Ok(self
            .all(symbol)
            .into_iter()
            .map(|b| b.date)
            .filter(|d| *d >= start && *d <= end)
            .collect())
    }

    fn stats(&self) -> Result<BarStats> {
        let bars = self.bars.lock().unwrap();
        let symbols: HashSet<&str> = bars.iter().map(|b| b.symbol.as_str()).collect();
        Ok(BarStats {
            total_bars: bars.len() as i64,
            symbols_with_bars: symbols.len() as i64,
            first_date: bars.iter().map(|b| b.date).min(),
            last_date: bars.iter().map(|b| b.date).max(),
        })
    }
}

// =========================================================================
// Symbols
// =========================================================================

#[derive(Clone, Default)]
pub struct MockSymbolStore {
    symbols: Arc<Mutex<BTreeMap<String, Symbol>>>,
}

impl MockSymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active(codes: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut symbols = store.symbols.lock().unwrap();
            for code in codes {
                symbols.insert(
                    code.to_string(),
                    SymbolMetadata::default().into_symbol(code, Utc::now()),
                );
            }
        }
        store
    }

    pub fn get(&self, code: &str) -> Option<Symbol> {
        self.symbols.lock().unwrap().get(code).cloned()
    }

    fn update<F: FnOnce(&mut Symbol)>(&self, code: &str, f: F) -> Result<()> {
        let mut symbols = self.symbols.lock().unwrap();
        let symbol = symbols
            .get_mut(code)
            .ok_or_else(|| DatabaseError::NotFound(format!("symbol {}", code)))?;
        f(symbol);
        Ok(())
    }
}

#[async_trait]
impl SymbolStore for MockSymbolStore {
    async fn upsert_symbol(&self, code: &str, metadata: SymbolMetadata) -> Result<Symbol> {
        let mut symbols = self.symbols.lock().unwrap();
        let symbol = match symbols.get_mut(code) {
            Some(existing) => {
                metadata.apply_to(existing);
                existing.clone()
            }
            None => {
                let symbol = metadata.into_symbol(code, Utc::now());
                symbols.insert(code.to_string(), symbol.clone());
                symbol
            }
        };
        Ok(symbol)
    }

    async fn mark_inactive(&self, code: &str, reason: &str) -> Result<()> {
        self.update(code, |s| {
            s.status = SymbolStatus::Inactive;
            s.last_error = Some(reason.to_string());
        })
    }

    async fn record_success(&self, code: &str, at: DateTime<Utc>) -> Result<()> {
        self.update(code, |s| {
            s.last_updated_at = Some(at);
            s.last_error = None;
        })
    }

    async fn record_failure(&self, code: &str, message: &str) -> Result<()> {
        self.update(code, |s| s.last_error = Some(message.to_string()))
    }

    fn get_symbol(&self, code: &str) -> Result<Option<Symbol>> {
        Ok(self.get(code))
    }

    fn list_symbols(&self, active_only: bool) -> Result<Vec<Symbol>> {
        Ok(self
            .symbols
            .lock()
            .unwrap()
            .values()
            .filter(|s| !active_only || s.is_active())
            .cloned()
            .collect())
    }

    fn search_symbols(&self, keyword: &str) -> Result<Vec<Symbol>> {
        Ok(self
            .symbols
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.code.contains(keyword)
                    || s.name.as_deref().is_some_and(|n| n.contains(keyword))
            })
            .cloned()
            .collect())
    }

    fn list_symbols_by_market(&self, market: &str) -> Result<Vec<Symbol>> {
        Ok(self
            .symbols
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.market.as_deref() == Some(market))
            .cloned()
            .collect())
    }

    fn list_symbols_by_industry(&self, industry: &str) -> Result<Vec<Symbol>> {
        Ok(self
            .symbols
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.industry.as_deref() == Some(industry))
            .cloned()
            .collect())
    }

    fn market_distribution(&self) -> Result<Vec<MarketCount>> {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for symbol in self.symbols.lock().unwrap().values() {
            let market = symbol.market.clone().unwrap_or_else(|| "unknown".to_string());
            *counts.entry(market).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(market, count)| MarketCount { market, count })
            .collect())
    }
}

// =========================================================================
// Gaps and metadata
// =========================================================================

#[derive(Clone, Default)]
pub struct MockGapStore {
    gaps: Arc<Mutex<BTreeMap<(String, NaiveDate), BarGap>>>,
}

impl MockGapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GapStore for MockGapStore {
    async fn record_gap(
        &self,
        symbol: &str,
        date: NaiveDate,
        error: Option<&str>,
    ) -> Result<BarGap> {
        let now = Utc::now();
        let mut gaps = self.gaps.lock().unwrap();
        let gap = gaps
            .entry((symbol.to_string(), date))
            .and_modify(|g| {
                g.attempts += 1;
                g.last_error = error.map(str::to_string);
                g.last_attempt_at = now;
            })
            .or_insert_with(|| BarGap {
                symbol: symbol.to_string(),
                date,
                attempts: 1,
                last_error: error.map(str::to_string),
                first_seen_at: now,
                last_attempt_at: now,
            });
        Ok(gap.clone())
    }

    async fn resolve_gap(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
        Ok(self
            .gaps
            .lock()
            .unwrap()
            .remove(&(symbol.to_string(), date))
            .is_some())
    }

    fn list_gaps(&self, symbol: &str) -> Result<Vec<BarGap>> {
        Ok(self
            .gaps
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.symbol == symbol)
            .cloned()
            .collect())
    }

    fn count_open_gaps(&self) -> Result<i64> {
        Ok(self.gaps.lock().unwrap().len() as i64)
    }
}

#[derive(Clone, Default)]
pub struct MockMetadataStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MockMetadataStore {
    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }
}

// =========================================================================
// Provider
// =========================================================================

/// Serves fixed rows per symbol, with optional scripted failures.
#[derive(Default)]
pub struct ScriptedProvider {
    rows: HashMap<String, Vec<RawBar>>,
    failures: Mutex<HashMap<String, VecDeque<MarketDataError>>>,
    unknown: HashSet<String>,
    unavailable: HashSet<String>,
    listing: Option<Vec<ListedSymbol>>,
    markets: Option<&'static [&'static str]>,
    monthly: Option<RateLimit>,
    dated_failures: Mutex<HashMap<(String, NaiveDate), VecDeque<MarketDataError>>>,
    calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, symbol: &str, rows: Vec<RawBar>) -> Self {
        self.rows.insert(symbol.to_string(), rows);
        self
    }

    /// Errors returned, in order, before rows are served.
    pub fn with_failures(self, symbol: &str, errors: Vec<MarketDataError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(symbol.to_string(), errors.into());
        self
    }

    /// Errors returned by the request starting on `start`, before it succeeds.
    pub fn with_failures_in(
        self,
        symbol: &str,
        start: NaiveDate,
        errors: Vec<MarketDataError>,
    ) -> Self {
        self.dated_failures
            .lock()
            .unwrap()
            .insert((symbol.to_string(), start), errors.into());
        self
    }

    /// Answer one month per request, under `limit`.
    pub fn with_monthly_requests(mut self, limit: RateLimit) -> Self {
        self.monthly = Some(limit);
        self
    }

    pub fn with_markets(mut self, markets: &'static [&'static str]) -> Self {
        self.markets = Some(markets);
        self
    }

    pub fn with_unknown(mut self, symbol: &str) -> Self {
        self.unknown.insert(symbol.to_string());
        self
    }

    /// Every fetch for `symbol` fails as unreachable.
    pub fn with_unavailable(mut self, symbol: &str) -> Self {
        self.unavailable.insert(symbol.to_string());
        self
    }

    pub fn with_listing(mut self, codes: &[&str]) -> Self {
        self.listing = Some(codes.iter().map(|c| ListedSymbol::new(*c)).collect());
        self
    }

    pub fn call_count(&self, symbol: &str) -> usize {
        self.calls(symbol).len()
    }

    pub fn calls(&self, symbol: &str) -> Vec<(NaiveDate, NaiveDate)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _, _)| s == symbol)
            .map(|(_, start, end)| (*start, *end))
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        "SCRIPTED"
    }

    fn rate_limit(&self) -> RateLimit {
        self.monthly.clone().unwrap_or_else(RateLimit::unlimited)
    }

    fn request_ranges(&self, start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
        match self.monthly {
            Some(_) => month_ranges(start, end),
            None if start > end => Vec::new(),
            None => vec![(start, end)],
        }
    }

    fn markets(&self) -> Option<&'static [&'static str]> {
        self.markets
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<RawBar>, MarketDataError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), start, end));

        if self.unknown.contains(symbol) {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        if let Some(err) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(symbol)
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }
        if let Some(err) = self
            .dated_failures
            .lock()
            .unwrap()
            .get_mut(&(symbol.to_string(), start))
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }
        if self.unavailable.contains(symbol) {
            return Err(MarketDataError::Unreachable {
                provider: self.id().to_string(),
                message: "connection refused".to_string(),
            });
        }

        Ok(self
            .rows
            .get(symbol)
            .map(|rows| {
                rows.iter()
                    .filter(|r| match NaiveDate::parse_from_str(&r.date, "%Y-%m-%d") {
                        Ok(date) => date >= start && date <= end,
                        Err(_) => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_symbols(&self) -> std::result::Result<Vec<ListedSymbol>, MarketDataError> {
        self.listing
            .clone()
            .ok_or_else(|| MarketDataError::NotSupported {
                provider: self.id().to_string(),
                operation: "list_symbols".to_string(),
            })
    }
}

