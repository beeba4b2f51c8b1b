use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::BarGap;
use crate::errors::Result;

/// Trading days the source could not supply.
#[async_trait]
pub trait GapStore: Send + Sync {
    /// Record a failed attempt at `date`, creating the gap or bumping its
    /// attempt count.
    async fn record_gap(&self, symbol: &str, date: NaiveDate, error: Option<&str>)
        -> Result<BarGap>;

    /// Forget the gap once the day is stored. Returns whether one existed.
    async fn resolve_gap(&self, symbol: &str, date: NaiveDate) -> Result<bool>;

    /// Open gaps for `symbol`, ascending by date.
    fn list_gaps(&self, symbol: &str) -> Result<Vec<BarGap>>;

    fn count_open_gaps(&self) -> Result<i64>;
}

/// Small key/value table for store-wide facts.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn set_metadata(&self, key: &str, value: &str) -> Result<()>;

    fn get_metadata(&self, key: &str) -> Result<Option<String>>;
}
