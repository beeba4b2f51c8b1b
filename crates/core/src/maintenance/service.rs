//! Maintenance runs over the symbol universe.
//!
//! ```text
//! MaintenanceService
//!       │
//!       ├─► planner (Full / Delta / Backfill / Repair per symbol)
//!       ├─► IngestionService (fetch, normalize, validate, upsert)
//!       ├─► SymbolStore (universe, success/failure stamps, pruning)
//!       ├─► GapStore (days the source could not supply)
//!       └─► MetadataStore (last run)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};

use super::cancel::CancellationFlag;
use super::model::{MaintenanceMode, PruneSummary, RunSummary, SymbolRunResult, SymbolRunStatus};
use super::planner::{plan_download, plan_repair, plan_update, StoredSpan, SyncPlan};
use super::store::{GapStore, MetadataStore};
use crate::bars::BarStore;
use crate::calendar::TradingCalendar;
use crate::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_HISTORY_START, DEFAULT_MAX_GAP_ATTEMPTS,
    META_LAST_MAINTENANCE_AT, META_LAST_MAINTENANCE_MODE,
};
use crate::errors::{Error, Result};
use crate::ingestion::{IngestionOutcome, IngestionServiceTrait, SourceClient};
use crate::symbols::{SymbolMetadata, SymbolStore};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    /// Symbols processed at once.
    pub concurrency: usize,
    /// Gaps that failed this often are no longer requested.
    pub max_gap_attempts: i32,
    /// Start of a full download when the listing date is unknown.
    pub history_start: NaiveDate,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_HISTORY_START;
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_gap_attempts: DEFAULT_MAX_GAP_ATTEMPTS,
            history_start: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
        }
    }
}

pub struct MaintenanceService {
    ingestion: Arc<dyn IngestionServiceTrait>,
    client: Arc<SourceClient>,
    bar_store: Arc<dyn BarStore>,
    symbol_store: Arc<dyn SymbolStore>,
    gap_store: Arc<dyn GapStore>,
    metadata_store: Arc<dyn MetadataStore>,
    calendar: Arc<dyn TradingCalendar>,
    config: MaintenanceConfig,
    clock: Clock,
}

impl MaintenanceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ingestion: Arc<dyn IngestionServiceTrait>,
        client: Arc<SourceClient>,
        bar_store: Arc<dyn BarStore>,
        symbol_store: Arc<dyn SymbolStore>,
        gap_store: Arc<dyn GapStore>,
        metadata_store: Arc<dyn MetadataStore>,
        calendar: Arc<dyn TradingCalendar>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            ingestion,
            client,
            bar_store,
            symbol_store,
            gap_store,
            metadata_store,
            calendar,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for "now".
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run `mode` over `symbols`, or over every active symbol when `None`.
    ///
    /// A failing symbol is recorded and the run continues. Only store
    /// failures while resolving the universe abort the run.
    pub async fn run(
        &self,
        mode: MaintenanceMode,
        symbols: Option<Vec<String>>,
        cancel: &CancellationFlag,
    ) -> Result<RunSummary> {
        let started_at = self.now();
        let codes = self.resolve_universe(symbols).await?;
        let last_close = self.calendar.last_market_close_day(started_at);
        let concurrency = self.config.concurrency.max(1);

        info!(
            "Starting {} for {} symbols (last close {}, concurrency {})",
            mode,
            codes.len(),
            last_close,
            concurrency
        );

        let mut results: Vec<SymbolRunResult> = stream::iter(codes)
            .map(|code| async move {
                if cancel.is_cancelled() {
                    debug!("Run cancelled, skipping {}", code);
                    return SymbolRunResult::cancelled(code);
                }
                self.process_symbol(mode, &code, last_close).await
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut summary = RunSummary::new(mode, started_at);
        for result in results {
            summary.add_result(result);
        }
        let finished_at = self.now();
        summary.finished_at = Some(finished_at);

        if let Err(e) = self.record_run(mode, finished_at).await {
            warn!("Failed to record maintenance run: {}", e);
        }

        if summary.is_success() {
            info!("{}", summary.summary());
        } else {
            warn!("{}", summary.summary());
        }
        Ok(summary)
    }

    async fn resolve_universe(&self, symbols: Option<Vec<String>>) -> Result<Vec<String>> {
        match symbols {
            Some(list) if !list.is_empty() => {
                let mut seen = HashSet::new();
                let mut codes = Vec::with_capacity(list.len());
                for code in list {
                    let code = code.trim().to_string();
                    if code.is_empty() || !seen.insert(code.clone()) {
                        continue;
                    }
                    if self.symbol_store.get_symbol(&code)?.is_none() {
                        self.symbol_store
                            .upsert_symbol(&code, SymbolMetadata::default())
                            .await?;
                    }
                    codes.push(code);
                }
                Ok(codes)
            }
            _ => Ok(self
                .symbol_store
                .list_symbols(true)?
                .into_iter()
                .map(|s| s.code)
                .collect()),
        }
    }

    async fn record_run(&self, mode: MaintenanceMode, at: DateTime<Utc>) -> Result<()> {
        self.metadata_store
            .set_metadata(META_LAST_MAINTENANCE_AT, &at.to_rfc3339())
            .await?;
        self.metadata_store
            .set_metadata(META_LAST_MAINTENANCE_MODE, mode.as_str())
            .await
    }

    /// Process one symbol and stamp the outcome on it. Never fails.
    async fn process_symbol(
        &self,
        mode: MaintenanceMode,
        code: &str,
        last_close: NaiveDate,
    ) -> SymbolRunResult {
        match self.sync_symbol(mode, code, last_close).await {
            Ok(result) => {
                if let Err(e) = self.symbol_store.record_success(code, self.now()).await {
                    warn!("Failed to record success for {}: {}", code, e);
                }
                result
            }
            Err(err) => {
                error!("{} failed for {}: {}", mode, code, err);
                let message = err.to_string();
                if let Err(e) = self.symbol_store.record_failure(code, &message).await {
                    warn!("Failed to record failure for {}: {}", code, e);
                }
                if matches!(err, Error::SymbolNotFound(_)) {
                    if let Err(e) = self.symbol_store.mark_inactive(code, &message).await {
                        warn!("Failed to deactivate {}: {}", code, e);
                    }
                }
                SymbolRunResult::failed(code, message)
            }
        }
    }

    async fn sync_symbol(
        &self,
        mode: MaintenanceMode,
        code: &str,
        last_close: NaiveDate,
    ) -> Result<SymbolRunResult> {
        let plan = self.plan(mode, code, last_close)?;
        debug!("{} plan for {}: {:?}", mode, code, plan);

        let mut result = SymbolRunResult::new(code, SymbolRunStatus::Success);
        result.plan = Some(plan.label().to_string());

        match &plan {
            SyncPlan::UpToDate => {
                result.status = SymbolRunStatus::UpToDate;
            }
            SyncPlan::Repair { dates } => {
                self.repair_dates(code, dates, &mut result).await?;
            }
            _ => {
                for (start, end) in plan.ranges() {
                    let ingestion = self.ingestion.ingest(code, start, end).await?;
                    if ingestion.outcome == IngestionOutcome::Partial {
                        result.status = SymbolRunStatus::Partial;
                    }
                    result.absorb(&ingestion);
                }
            }
        }

        Ok(result)
    }

    fn plan(&self, mode: MaintenanceMode, code: &str, last_close: NaiveDate) -> Result<SyncPlan> {
        let span = StoredSpan {
            first: self.bar_store.first_bar_date(code)?,
            last: self.bar_store.latest_bar(code)?.map(|b| b.date),
        };
        let history_start = self
            .symbol_store
            .get_symbol(code)?
            .and_then(|s| s.listed_since)
            .unwrap_or(self.config.history_start);

        match mode {
            MaintenanceMode::Update => Ok(plan_update(span, history_start, last_close)),
            MaintenanceMode::Download => Ok(plan_download(
                span,
                history_start,
                last_close,
                self.calendar.as_ref(),
            )),
            MaintenanceMode::Repair => {
                let (Some(first), Some(last)) = (span.first, span.last) else {
                    return Ok(SyncPlan::UpToDate);
                };
                let stored = self.bar_store.stored_dates(code, first, last)?;
                let exhausted: HashSet<NaiveDate> = self
                    .gap_store
                    .list_gaps(code)?
                    .into_iter()
                    .filter(|g| g.attempts >= self.config.max_gap_attempts)
                    .map(|g| g.date)
                    .collect();
                Ok(plan_repair(
                    self.calendar.as_ref(),
                    first,
                    last,
                    &stored,
                    &exhausted,
                ))
            }
        }
    }

    /// Request each missing day on its own. Days the source still lacks are
    /// recorded as gaps; an unavailable source stops the symbol.
    async fn repair_dates(
        &self,
        code: &str,
        dates: &[NaiveDate],
        result: &mut SymbolRunResult,
    ) -> Result<()> {
        for date in dates {
            let ingestion = match self.ingestion.ingest(code, *date, *date).await {
                Ok(ingestion) => ingestion,
                Err(err) => {
                    let message = err.to_string();
                    self.gap_store.record_gap(code, *date, Some(&message)).await?;
                    return Err(err);
                }
            };
            result.absorb(&ingestion);

            // Only a stored row closes the gap. A fetched row can still be
            // dropped as invalid or lose to a corrupt same-day repeat.
            let filled = !self.bar_store.stored_dates(code, *date, *date)?.is_empty();
            if filled {
                self.gap_store.resolve_gap(code, *date).await?;
            } else {
                let gap = self.gap_store.record_gap(code, *date, None).await?;
                debug!(
                    "{} {} still missing after {} attempt(s)",
                    code, date, gap.attempts
                );
                result.gaps_open += 1;
            }
        }

        if result.gaps_open > 0 {
            result.status = SymbolRunStatus::Partial;
        }
        Ok(())
    }

    /// Deactivate active symbols missing from the source's current listing.
    ///
    /// A source that cannot list symbols prunes nothing. An empty listing is
    /// treated as a source fault rather than a delisting of everything.
    /// Symbols on a market the listing does not cover are left alone; a
    /// symbol with no recorded market is checked.
    pub async fn prune(&self) -> Result<PruneSummary> {
        let Some(listing) = self.client.list_symbols().await? else {
            info!(
                "{} cannot list symbols, nothing to prune",
                self.client.source_id()
            );
            return Ok(PruneSummary::default());
        };

        let mut summary = PruneSummary {
            listing_available: true,
            ..PruneSummary::default()
        };
        if listing.is_empty() {
            warn!(
                "{} returned an empty listing, skipping prune",
                self.client.source_id()
            );
            return Ok(summary);
        }

        let listed: HashSet<String> = listing.into_iter().map(|s| s.code).collect();
        let markets = self.client.markets();
        for symbol in self.symbol_store.list_symbols(true)? {
            if let (Some(covered), Some(market)) = (markets, symbol.market.as_deref()) {
                if !covered.contains(&market) {
                    debug!("{} is on {}, outside the listing", symbol.code, market);
                    summary.skipped += 1;
                    continue;
                }
            }
            summary.checked += 1;
            if !listed.contains(&symbol.code) {
                self.symbol_store
                    .mark_inactive(&symbol.code, "absent from source listing")
                    .await?;
                summary.deactivated.push(symbol.code);
            }
        }

        info!(
            "Pruned {} of {} active symbols ({} on other markets)",
            summary.deactivated.len(),
            summary.checked,
            summary.skipped
        );
        Ok(summary)
    }

    /// Upsert the source's listing as active symbols. Returns the count.
    pub async fn sync_symbols(&self) -> Result<usize> {
        let listing = self.client.list_symbols().await?.ok_or_else(|| {
            Error::MarketData(stockbase_market_data::MarketDataError::NotSupported {
                provider: self.client.source_id().to_string(),
                operation: "list_symbols".to_string(),
            })
        })?;

        let mut count = 0;
        for listed in listing {
            let code = listed.code.clone();
            self.symbol_store
                .upsert_symbol(&code, SymbolMetadata::from(listed))
                .await?;
            count += 1;
        }
        info!("Synced {} symbols from {}", count, self.client.source_id());
        Ok(count)
    }
}
