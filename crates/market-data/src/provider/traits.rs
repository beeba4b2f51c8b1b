//! Market data provider trait definitions.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{ListedSymbol, RawBar};

use super::capabilities::RateLimit;

/// Trait for market data providers.
///
/// Implement this trait to add support for a new data source.
///
/// # Contract
///
/// - `fetch_range` returns the rows the source has for `[start, end]`,
///   inclusive. It may return fewer days than requested, and returns an
///   empty vector when the source simply has no data. That is not an error.
/// - Rows outside the requested range should not be returned.
/// - A range taken from `request_ranges` costs exactly one request.
/// - Errors are reserved for a source that cannot answer: transport
///   failures, refusals, unparseable payloads, unknown symbols.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use stockbase_market_data::{MarketDataProvider, RateLimit};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     async fn fetch_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
///         -> Result<Vec<RawBar>, MarketDataError> {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Used for logging and circuit breaker tracking.
    fn id(&self) -> &'static str;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// The ranges one request to this source can answer.
    ///
    /// Callers split `[start, end]` along these ranges and pace each one
    /// through the rate limiter. The default is a single request.
    fn request_ranges(&self, start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
        if start > end {
            return Vec::new();
        }
        vec![(start, end)]
    }

    /// Markets whose listing this provider reports, or `None` when it
    /// makes no claim about market coverage.
    fn markets(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// Fetch daily rows for `symbol` between `start` and `end`, inclusive.
    async fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, MarketDataError>;

    /// The provider's current symbol universe.
    ///
    /// Default implementation reports the operation as unsupported.
    async fn list_symbols(&self) -> Result<Vec<ListedSymbol>, MarketDataError> {
        Err(MarketDataError::NotSupported {
            provider: self.id().to_string(),
            operation: "list_symbols".to_string(),
        })
    }
}
