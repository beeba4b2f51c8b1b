use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::bars::{Bar, BarStore, BarValidator};
use crate::calendar::market_today;
use crate::constants::{DEFAULT_HISTORY_START, META_LAST_MAINTENANCE_AT};
use crate::errors::Result;
use crate::maintenance::{GapStore, MetadataStore};
use crate::symbols::{MarketCount, Symbol, SymbolStore};

/// Overview of what the store holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub total_symbols: usize,
    pub active_symbols: usize,
    pub total_bars: i64,
    pub symbols_with_bars: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub open_gaps: i64,
    pub markets: Vec<MarketCount>,
    pub last_maintenance_at: Option<DateTime<Utc>>,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Query facade. Never writes.
///
/// Results are sorted ascending by date and rows that break the OHLC
/// invariants are dropped, whatever the store returns.
pub struct QueryService {
    bar_store: Arc<dyn BarStore>,
    symbol_store: Arc<dyn SymbolStore>,
    gap_store: Arc<dyn GapStore>,
    metadata_store: Arc<dyn MetadataStore>,
    validator: BarValidator,
    clock: Clock,
}

impl QueryService {
    pub fn new(
        bar_store: Arc<dyn BarStore>,
        symbol_store: Arc<dyn SymbolStore>,
        gap_store: Arc<dyn GapStore>,
        metadata_store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            bar_store,
            symbol_store,
            gap_store,
            metadata_store,
            validator: BarValidator::default(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn clean(&self, symbol: &str, mut bars: Vec<Bar>) -> Vec<Bar> {
        let before = bars.len();
        bars.retain(|b| self.validator.is_valid(b));
        if bars.len() < before {
            warn!(
                "Filtered {} corrupt bar(s) from {} query results",
                before - bars.len(),
                symbol
            );
        }
        bars.sort_by_key(|b| b.date);
        bars
    }

    pub fn get_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let bars = self.bar_store.get_bars(symbol, start, end)?;
        Ok(self.clean(symbol, bars))
    }

    /// Everything from the default history start through today's date in
    /// the market's time zone.
    pub fn get_bars_default(&self, symbol: &str) -> Result<Vec<Bar>> {
        let (y, m, d) = DEFAULT_HISTORY_START;
        let start = NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
        self.get_bars(symbol, start, market_today((self.clock)()))
    }

    /// Newest bar that passes validation. A corrupt newest row falls back
    /// to the last valid one before it.
    pub fn latest_bar(&self, symbol: &str) -> Result<Option<Bar>> {
        let Some(newest) = self.bar_store.latest_bar(symbol)? else {
            return Ok(None);
        };
        if self.validator.is_valid(&newest) {
            return Ok(Some(newest));
        }

        warn!("Newest {} bar on {} is corrupt, scanning back", symbol, newest.date);
        let first = self.bar_store.first_bar_date(symbol)?.unwrap_or(newest.date);
        let bars = self.bar_store.get_bars(symbol, first, newest.date)?;
        Ok(self.clean(symbol, bars).pop())
    }

    pub fn list_symbols(&self, active_only: bool) -> Result<Vec<Symbol>> {
        self.symbol_store.list_symbols(active_only)
    }

    pub fn get_symbol(&self, code: &str) -> Result<Option<Symbol>> {
        self.symbol_store.get_symbol(code)
    }

    pub fn search_symbols(&self, keyword: &str) -> Result<Vec<Symbol>> {
        self.symbol_store.search_symbols(keyword.trim())
    }

    pub fn symbols_by_market(&self, market: &str) -> Result<Vec<Symbol>> {
        self.symbol_store
            .list_symbols_by_market(&market.trim().to_lowercase())
    }

    /// Symbols whose industry matches exactly, ordered by code.
    pub fn symbols_by_industry(&self, industry: &str) -> Result<Vec<Symbol>> {
        self.symbol_store.list_symbols_by_industry(industry.trim())
    }

    pub fn database_info(&self) -> Result<DatabaseInfo> {
        let symbols = self.symbol_store.list_symbols(false)?;
        let active_symbols = symbols.iter().filter(|s| s.is_active()).count();
        let stats = self.bar_store.stats()?;
        let last_maintenance_at = self
            .metadata_store
            .get_metadata(META_LAST_MAINTENANCE_AT)?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(DatabaseInfo {
            total_symbols: symbols.len(),
            active_symbols,
            total_bars: stats.total_bars,
            symbols_with_bars: stats.symbols_with_bars,
            first_date: stats.first_date,
            last_date: stats.last_date,
            open_gaps: self.gap_store.count_open_gaps()?,
            markets: self.symbol_store.market_distribution()?,
            last_maintenance_at,
        })
    }
}
