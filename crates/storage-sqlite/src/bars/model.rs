//! Database model for daily bars.

use chrono::Utc;
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::{format_date, parse_date};
use stockbase_core::bars::{Bar, BarStats};

/// Database model for daily bars
#[derive(
    Queryable,
    Identifiable,
    Selectable,
    Insertable,
    AsChangeset,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    PartialEq,
    QueryableByName,
)]
#[diesel(table_name = crate::schema::daily_bars)]
#[diesel(primary_key(symbol, trade_date))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct DailyBarDB {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub symbol: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub trade_date: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub open: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub high: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub low: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub close: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub volume: i64,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub updated_at: String,
}

impl From<&Bar> for DailyBarDB {
    fn from(bar: &Bar) -> Self {
        Self {
            symbol: bar.symbol.clone(),
            trade_date: format_date(bar.date),
            open: bar.open.to_string(),
            high: bar.high.to_string(),
            low: bar.low.to_string(),
            close: bar.close.to_string(),
            volume: bar.volume,
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

impl From<DailyBarDB> for Bar {
    fn from(db: DailyBarDB) -> Self {
        Self {
            date: parse_date(&db.trade_date).unwrap_or_default(),
            open: Decimal::from_str(&db.open).unwrap_or_default(),
            high: Decimal::from_str(&db.high).unwrap_or_default(),
            low: Decimal::from_str(&db.low).unwrap_or_default(),
            close: Decimal::from_str(&db.close).unwrap_or_default(),
            volume: db.volume,
            symbol: db.symbol,
        }
    }
}

/// Aggregates over `daily_bars`.
#[derive(QueryableByName, Debug)]
pub struct BarStatsRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub total_bars: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub symbols_with_bars: i64,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub first_date: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub last_date: Option<String>,
}

impl From<BarStatsRow> for BarStats {
    fn from(row: BarStatsRow) -> Self {
        Self {
            total_bars: row.total_bars,
            symbols_with_bars: row.symbols_with_bars,
            first_date: row.first_date.as_deref().and_then(parse_date),
            last_date: row.last_date.as_deref().and_then(parse_date),
        }
    }
}
