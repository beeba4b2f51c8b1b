use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionOutcome {
    /// Every fetched row was stored or already present.
    #[default]
    Success,
    /// Some rows were discarded as invalid.
    Partial,
    Failure,
}

/// Counts for one `ingest` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Raw rows returned by the source.
    pub fetched: usize,
    /// Rows inserted or updated.
    pub written: usize,
    /// Same-date repeats in the fetch plus rows already stored unchanged.
    pub duplicates_skipped: usize,
    /// Rows that could not be normalized or broke the OHLC invariants.
    pub invalid_skipped: usize,
    pub outcome: IngestionOutcome,
    pub error: Option<String>,
}

impl IngestionResult {
    pub fn empty(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            fetched: 0,
            written: 0,
            duplicates_skipped: 0,
            invalid_skipped: 0,
            outcome: IngestionOutcome::Success,
            error: None,
        }
    }

    pub fn failed(
        symbol: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        error: impl Into<String>,
    ) -> Self {
        Self {
            outcome: IngestionOutcome::Failure,
            error: Some(error.into()),
            ..Self::empty(symbol, start, end)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == IngestionOutcome::Failure
    }
}
