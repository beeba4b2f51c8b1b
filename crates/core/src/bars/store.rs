use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{Bar, BarStats, UpsertOutcome};
use crate::errors::Result;

/// Persistence contract for daily bars.
///
/// Mutations are async because implementations serialize them through a
/// single writer. Reads are synchronous and never wait on the writer.
#[async_trait]
pub trait BarStore: Send + Sync {
    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert or update `bars` for `symbol` in one transaction.
    ///
    /// Every bar must belong to `symbol` and satisfy the OHLC invariants;
    /// otherwise the call fails with `Error::Integrity` and nothing is written.
    /// Existing rows are rewritten only when their values differ.
    async fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<UpsertOutcome>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Bars in `[start, end]`, ascending by date. Empty when there is no data.
    fn get_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>>;

    /// Most recent stored bar.
    fn latest_bar(&self, symbol: &str) -> Result<Option<Bar>>;

    /// Oldest stored date.
    fn first_bar_date(&self, symbol: &str) -> Result<Option<NaiveDate>>;

    /// Stored dates in `[start, end]`, ascending.
    fn stored_dates(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<NaiveDate>>;

    fn stats(&self) -> Result<BarStats>;
}
