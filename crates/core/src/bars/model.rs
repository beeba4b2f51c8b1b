use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One day's OHLCV record for a symbol. Keyed by `(symbol, date)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Traded shares
    pub volume: i64,
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Whether two bars carry the same values.
    ///
    /// Prices compare numerically, so `590.00` and `590` are equal.
    pub fn same_values(&self, other: &Bar) -> bool {
        self.open == other.open
            && self.high == other.high
            && self.low == other.low
            && self.close == other.close
            && self.volume == other.volume
    }
}

/// What `upsert_bars` did with each submitted row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    /// New (symbol, date) pairs.
    pub inserted: usize,
    /// Existing rows whose values changed.
    pub updated: usize,
    /// Existing rows submitted with identical values; not rewritten.
    pub unchanged: usize,
}

impl UpsertOutcome {
    /// Rows that actually hit the table.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Aggregate numbers over the bar table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarStats {
    pub total_bars: i64,
    pub symbols_with_bars: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}
