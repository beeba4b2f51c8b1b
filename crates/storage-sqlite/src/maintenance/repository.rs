use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::{BarGapDB, StoreMetadataDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::bar_gaps::dsl as gaps_dsl;
use crate::schema::store_metadata::dsl as metadata_dsl;
use crate::utils::format_date;
use stockbase_core::maintenance::{BarGap, GapStore, MetadataStore};
use stockbase_core::Result;

/// Gap tracking and the store metadata table.
pub struct MaintenanceRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl MaintenanceRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

// =============================================================================
// GapStore Implementation
// =============================================================================

#[async_trait]
impl GapStore for MaintenanceRepository {
    async fn record_gap(
        &self,
        symbol: &str,
        date: NaiveDate,
        error: Option<&str>,
    ) -> Result<BarGap> {
        let symbol_owned = symbol.to_string();
        let date_str = format_date(date);
        let error_owned = error.map(str::to_string);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<BarGap> {
                let now = Utc::now();
                let existing = gaps_dsl::bar_gaps
                    .find((&symbol_owned, &date_str))
                    .select(BarGapDB::as_select())
                    .first::<BarGapDB>(conn)
                    .optional()
                    .map_err(StorageError::QueryFailed)?;

                let gap = match existing {
                    Some(row) => BarGap {
                        attempts: row.attempts + 1,
                        last_error: error_owned,
                        last_attempt_at: now,
                        ..BarGap::from(row)
                    },
                    None => BarGap {
                        symbol: symbol_owned,
                        date,
                        attempts: 1,
                        last_error: error_owned,
                        first_seen_at: now,
                        last_attempt_at: now,
                    },
                };

                diesel::replace_into(gaps_dsl::bar_gaps)
                    .values(BarGapDB::from(&gap))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;

                Ok(gap)
            })
            .await
    }

    async fn resolve_gap(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
        let symbol_owned = symbol.to_string();
        let date_str = format_date(date);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let deleted = diesel::delete(gaps_dsl::bar_gaps.find((&symbol_owned, &date_str)))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(deleted > 0)
            })
            .await
    }

    fn list_gaps(&self, symbol: &str) -> Result<Vec<BarGap>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = gaps_dsl::bar_gaps
            .filter(gaps_dsl::symbol.eq(symbol))
            .order(gaps_dsl::trade_date.asc())
            .select(BarGapDB::as_select())
            .load::<BarGapDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(BarGap::from).collect())
    }

    fn count_open_gaps(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        gaps_dsl::bar_gaps
            .count()
            .get_result::<i64>(&mut conn)
            .into_core()
    }
}

// =============================================================================
// MetadataStore Implementation
// =============================================================================

#[async_trait]
impl MetadataStore for MaintenanceRepository {
    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let row = StoreMetadataDB {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: Utc::now().to_rfc3339(),
        };

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::replace_into(metadata_dsl::store_metadata)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(())
            })
            .await
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        metadata_dsl::store_metadata
            .find(key)
            .select(metadata_dsl::value)
            .first::<String>(&mut conn)
            .optional()
            .into_core()
    }
}
