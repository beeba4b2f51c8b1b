use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::model::{BarStatsRow, DailyBarDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::daily_bars::dsl as bars_dsl;
use crate::utils::{chunk_for_sqlite, format_date, parse_date};
use stockbase_core::bars::{Bar, BarStats, BarStore, BarValidator, UpsertOutcome};
use stockbase_core::errors::IntegrityError;
use stockbase_core::Result;

pub struct BarRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
    validator: BarValidator,
}

impl BarRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self {
            pool,
            writer,
            validator: BarValidator::new(),
        }
    }

    /// Reject the whole batch if any bar is foreign or breaks an invariant.
    fn check_batch(&self, symbol: &str, bars: &[Bar]) -> Result<()> {
        if let Some(foreign) = bars.iter().find(|b| b.symbol != symbol) {
            return Err(IntegrityError::SymbolMismatch {
                expected: symbol.to_string(),
                found: foreign.symbol.clone(),
            }
            .into());
        }

        let reasons: Vec<String> = bars
            .iter()
            .filter_map(|bar| self.validator.validate(bar).err())
            .map(|e| e.to_string())
            .collect();

        if !reasons.is_empty() {
            return Err(IntegrityError::RejectedBatch {
                symbol: symbol.to_string(),
                reasons,
            }
            .into());
        }

        Ok(())
    }
}

// =============================================================================
// BarStore Implementation
// =============================================================================

#[async_trait]
impl BarStore for BarRepository {
    // =========================================================================
    // Mutations
    // =========================================================================

    async fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<UpsertOutcome> {
        if bars.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        self.check_batch(symbol, bars)?;

        // Later rows for the same date win.
        let by_date: BTreeMap<NaiveDate, DailyBarDB> = bars
            .iter()
            .map(|bar| (bar.date, DailyBarDB::from(bar)))
            .collect();
        let symbol_owned = symbol.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<UpsertOutcome> {
                let dates: Vec<String> = by_date.keys().map(|d| format_date(*d)).collect();

                let mut existing: HashMap<String, Bar> = HashMap::with_capacity(dates.len());
                for chunk in chunk_for_sqlite(&dates) {
                    let rows = bars_dsl::daily_bars
                        .filter(bars_dsl::symbol.eq(&symbol_owned))
                        .filter(bars_dsl::trade_date.eq_any(chunk))
                        .select(DailyBarDB::as_select())
                        .load::<DailyBarDB>(conn)
                        .map_err(StorageError::QueryFailed)?;
                    for row in rows {
                        existing.insert(row.trade_date.clone(), Bar::from(row));
                    }
                }

                let mut outcome = UpsertOutcome::default();
                let mut fresh: Vec<DailyBarDB> = Vec::new();
                let mut changed: Vec<DailyBarDB> = Vec::new();

                for row in by_date.into_values() {
                    match existing.get(&row.trade_date) {
                        None => fresh.push(row),
                        Some(stored) if stored.same_values(&Bar::from(row.clone())) => {
                            outcome.unchanged += 1;
                        }
                        Some(_) => changed.push(row),
                    }
                }

                for chunk in fresh.chunks(1_000) {
                    outcome.inserted += diesel::insert_into(bars_dsl::daily_bars)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)?;
                }

                for chunk in changed.chunks(1_000) {
                    outcome.updated += diesel::replace_into(bars_dsl::daily_bars)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)?;
                }

                debug!(
                    "Upserted bars for {}: {} inserted, {} updated, {} unchanged",
                    symbol_owned, outcome.inserted, outcome.updated, outcome.unchanged
                );
                Ok(outcome)
            })
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn get_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = bars_dsl::daily_bars
            .filter(bars_dsl::symbol.eq(symbol))
            .filter(bars_dsl::trade_date.ge(format_date(start)))
            .filter(bars_dsl::trade_date.le(format_date(end)))
            .order(bars_dsl::trade_date.asc())
            .select(DailyBarDB::as_select())
            .load::<DailyBarDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(Bar::from).collect())
    }

    fn latest_bar(&self, symbol: &str) -> Result<Option<Bar>> {
        let mut conn = get_connection(&self.pool)?;

        let row = bars_dsl::daily_bars
            .filter(bars_dsl::symbol.eq(symbol))
            .order(bars_dsl::trade_date.desc())
            .select(DailyBarDB::as_select())
            .first::<DailyBarDB>(&mut conn)
            .optional()
            .into_core()?;

        Ok(row.map(Bar::from))
    }

    fn first_bar_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;

        let first: Option<String> = bars_dsl::daily_bars
            .filter(bars_dsl::symbol.eq(symbol))
            .select(diesel::dsl::min(bars_dsl::trade_date))
            .get_result::<Option<String>>(&mut conn)
            .into_core()?;

        Ok(first.as_deref().and_then(parse_date))
    }

    fn stored_dates(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;

        let dates: Vec<String> = bars_dsl::daily_bars
            .filter(bars_dsl::symbol.eq(symbol))
            .filter(bars_dsl::trade_date.ge(format_date(start)))
            .filter(bars_dsl::trade_date.le(format_date(end)))
            .order(bars_dsl::trade_date.asc())
            .select(bars_dsl::trade_date)
            .load::<String>(&mut conn)
            .into_core()?;

        Ok(dates.iter().filter_map(|d| parse_date(d)).collect())
    }

    fn stats(&self) -> Result<BarStats> {
        let mut conn = get_connection(&self.pool)?;

        let row = sql_query(
            "SELECT COUNT(*) AS total_bars, \
                    COUNT(DISTINCT symbol) AS symbols_with_bars, \
                    MIN(trade_date) AS first_date, \
                    MAX(trade_date) AS last_date \
             FROM daily_bars",
        )
        .get_result::<BarStatsRow>(&mut conn)
        .into_core()?;

        Ok(BarStats::from(row))
    }
}
