//! Resilient access to one market data source.
//!
//! Wraps a provider with its rate limiter, a circuit breaker and the retry
//! policy, and translates provider errors into the core taxonomy.

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};

use stockbase_market_data::{
    CircuitBreaker, ListedSymbol, MarketDataError, MarketDataProvider, RateLimiter, RawBar,
    RetryClass,
};

use super::retry::RetryPolicy;
use crate::errors::{Error, Result};

pub struct SourceClient {
    provider: Arc<dyn MarketDataProvider>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl SourceClient {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::with_retry(provider, RetryPolicy::default())
    }

    pub fn with_retry(provider: Arc<dyn MarketDataProvider>, retry: RetryPolicy) -> Self {
        let breaker = CircuitBreaker::new(provider.id());
        Self::with_breaker(provider, retry, breaker)
    }

    pub fn with_breaker(
        provider: Arc<dyn MarketDataProvider>,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        let limiter = RateLimiter::new(provider.id(), &provider.rate_limit());
        Self {
            provider,
            limiter,
            breaker,
            retry,
        }
    }

    pub fn source_id(&self) -> &'static str {
        self.provider.id()
    }

    /// Markets the source's listing covers, when it says.
    pub fn markets(&self) -> Option<&'static [&'static str]> {
        self.provider.markets()
    }

    /// Most fetches the source tolerates at once.
    pub fn max_concurrency(&self) -> usize {
        self.provider.rate_limit().max_concurrency.max(1)
    }

    /// Fetch raw rows for `[start, end]`.
    ///
    /// The range is split into the provider's request units. Each one takes
    /// a rate limiter token and is retried on its own, so a failing month
    /// never refetches the months before it. Transient failures are retried
    /// with backoff. When the attempts run out, or the source cannot be
    /// reached at all, the result is `Error::SourceUnavailable`. An empty
    /// vector means the source had no data for the range.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>> {
        let mut rows = Vec::new();
        for (from, to) in self.provider.request_ranges(start, end) {
            rows.extend(self.fetch_request(symbol, from, to).await?);
        }
        Ok(rows)
    }

    /// One paced request, with retries.
    async fn fetch_request(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>> {
        let provider_id = self.provider.id();
        let mut attempt: u32 = 1;

        loop {
            if !self.breaker.is_allowed() {
                return Err(Error::from_source(
                    symbol,
                    MarketDataError::CircuitOpen {
                        provider: provider_id.to_string(),
                    },
                ));
            }

            self.limiter.acquire().await;
            debug!(
                "Fetching {} {}..{} from {} (attempt {})",
                symbol, start, end, provider_id, attempt
            );

            let err = match self.provider.fetch_range(symbol, start, end).await {
                Ok(rows) => {
                    self.breaker.record_success();
                    return Ok(rows);
                }
                Err(e) => e,
            };

            if err.is_source_unavailable() {
                self.breaker.record_failure();
            }

            match err.retry_class() {
                RetryClass::WithBackoff if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "{} fetch for {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        provider_id, symbol, attempt, self.retry.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryClass::WithBackoff => {
                    return Err(Error::SourceUnavailable {
                        symbol: symbol.to_string(),
                        reason: format!("gave up after {} attempts: {}", attempt, err),
                    });
                }
                RetryClass::Never | RetryClass::CircuitOpen => {
                    return Err(Error::from_source(symbol, err));
                }
            }
        }
    }

    /// The source's current listing, or `None` when it cannot list symbols.
    pub async fn list_symbols(&self) -> Result<Option<Vec<ListedSymbol>>> {
        if !self.breaker.is_allowed() {
            return Err(Error::from_source(
                "*",
                MarketDataError::CircuitOpen {
                    provider: self.provider.id().to_string(),
                },
            ));
        }
        self.limiter.acquire().await;

        match self.provider.list_symbols().await {
            Ok(listing) => {
                self.breaker.record_success();
                Ok(Some(listing))
            }
            Err(MarketDataError::NotSupported { .. }) => Ok(None),
            Err(e) => {
                if e.is_source_unavailable() {
                    self.breaker.record_failure();
                }
                Err(Error::from_source("*", e))
            }
        }
    }
}
