//! Database model for the symbol universe.

use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::{format_date, parse_date, parse_datetime};
use stockbase_core::symbols::{MarketCount, Symbol};

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
#[diesel(table_name = crate::schema::symbols)]
#[diesel(primary_key(code))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct SymbolDB {
    pub code: String,
    pub name: Option<String>,
    pub market: Option<String>,
    pub industry: Option<String>,
    pub security_type: Option<String>,
    pub status: String,
    pub listed_since: Option<String>,
    pub last_updated_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Symbol> for SymbolDB {
    fn from(symbol: &Symbol) -> Self {
        Self {
            code: symbol.code.clone(),
            name: symbol.name.clone(),
            market: symbol.market.clone(),
            industry: symbol.industry.clone(),
            security_type: symbol.security_type.clone(),
            status: symbol.status.as_str().to_string(),
            listed_since: symbol.listed_since.map(format_date),
            last_updated_at: symbol.last_updated_at.map(|t| t.to_rfc3339()),
            last_error: symbol.last_error.clone(),
            created_at: symbol.created_at.to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

impl From<SymbolDB> for Symbol {
    fn from(db: SymbolDB) -> Self {
        Self {
            status: db.status.parse().unwrap_or_default(),
            listed_since: db.listed_since.as_deref().and_then(parse_date),
            last_updated_at: db.last_updated_at.as_deref().and_then(parse_datetime),
            created_at: parse_datetime(&db.created_at).unwrap_or_default(),
            code: db.code,
            name: db.name,
            market: db.market,
            industry: db.industry,
            security_type: db.security_type,
            last_error: db.last_error,
        }
    }
}

#[derive(QueryableByName, Debug)]
pub struct MarketCountRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub market: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub count: i64,
}

impl From<MarketCountRow> for MarketCount {
    fn from(row: MarketCountRow) -> Self {
        Self {
            market: row.market,
            count: row.count,
        }
    }
}
