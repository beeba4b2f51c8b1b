//! Database models for gap tracking and store metadata.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::{format_date, parse_date, parse_datetime};
use stockbase_core::maintenance::BarGap;

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
)]
#[diesel(table_name = crate::schema::bar_gaps)]
#[diesel(primary_key(symbol, trade_date))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct BarGapDB {
    pub symbol: String,
    pub trade_date: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub first_seen_at: String,
    pub last_attempt_at: String,
}

impl From<&BarGap> for BarGapDB {
    fn from(gap: &BarGap) -> Self {
        Self {
            symbol: gap.symbol.clone(),
            trade_date: format_date(gap.date),
            attempts: gap.attempts,
            last_error: gap.last_error.clone(),
            first_seen_at: gap.first_seen_at.to_rfc3339(),
            last_attempt_at: gap.last_attempt_at.to_rfc3339(),
        }
    }
}

impl From<BarGapDB> for BarGap {
    fn from(db: BarGapDB) -> Self {
        Self {
            date: parse_date(&db.trade_date).unwrap_or_default(),
            attempts: db.attempts,
            first_seen_at: parse_datetime(&db.first_seen_at).unwrap_or_default(),
            last_attempt_at: parse_datetime(&db.last_attempt_at).unwrap_or_default(),
            symbol: db.symbol,
            last_error: db.last_error,
        }
    }
}

#[derive(
    Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq,
)]
#[diesel(table_name = crate::schema::store_metadata)]
#[diesel(primary_key(key))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StoreMetadataDB {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
