use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use stockbase_market_data::ListedSymbol;

use crate::errors::{Error, ValidationError};

/// Listing status. Symbols are never deleted, only deactivated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolStatus {
    #[default]
    Active,
    Inactive,
}

impl SymbolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolStatus::Active => "ACTIVE",
            SymbolStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for SymbolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(SymbolStatus::Active),
            "INACTIVE" => Ok(SymbolStatus::Inactive),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "unknown symbol status '{}'",
                other
            )))),
        }
    }
}

/// A ticker and what we know about it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub code: String,
    pub name: Option<String>,
    /// `tse`, `otc` or `esb`
    pub market: Option<String>,
    pub industry: Option<String>,
    pub security_type: Option<String>,
    pub status: SymbolStatus,
    pub listed_since: Option<NaiveDate>,
    /// Last successful maintenance for this symbol.
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Symbol {
    pub fn is_active(&self) -> bool {
        self.status == SymbolStatus::Active
    }
}

/// Fields accepted by `upsert_symbol`.
///
/// `None` leaves the stored value untouched, so sparse updates never erase
/// metadata learned from a richer source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMetadata {
    pub name: Option<String>,
    pub market: Option<String>,
    pub industry: Option<String>,
    pub security_type: Option<String>,
    pub listed_since: Option<NaiveDate>,
    pub status: Option<SymbolStatus>,
}

impl SymbolMetadata {
    /// Apply these fields over an existing symbol.
    pub fn apply_to(&self, symbol: &mut Symbol) {
        if let Some(name) = &self.name {
            symbol.name = Some(name.clone());
        }
        if let Some(market) = &self.market {
            symbol.market = Some(market.clone());
        }
        if let Some(industry) = &self.industry {
            symbol.industry = Some(industry.clone());
        }
        if let Some(security_type) = &self.security_type {
            symbol.security_type = Some(security_type.clone());
        }
        if let Some(listed_since) = self.listed_since {
            symbol.listed_since = Some(listed_since);
        }
        if let Some(status) = self.status {
            symbol.status = status;
        }
    }

    /// A fresh symbol carrying these fields.
    pub fn into_symbol(self, code: &str, now: DateTime<Utc>) -> Symbol {
        let mut symbol = Symbol {
            code: code.to_string(),
            name: None,
            market: None,
            industry: None,
            security_type: None,
            status: SymbolStatus::Active,
            listed_since: None,
            last_updated_at: None,
            last_error: None,
            created_at: now,
        };
        self.apply_to(&mut symbol);
        symbol
    }
}

impl From<ListedSymbol> for SymbolMetadata {
    fn from(listed: ListedSymbol) -> Self {
        Self {
            name: listed.name,
            market: listed.market,
            industry: listed.industry,
            security_type: listed.security_type,
            listed_since: listed.listed_since,
            status: Some(SymbolStatus::Active),
        }
    }
}

/// Number of symbols per market board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCount {
    pub market: String,
    pub count: i64,
}
