//! Stockbase Market Data Crate
//!
//! Provider-agnostic access to daily price history for exchange-listed symbols.
//!
//! # Overview
//!
//! - [`MarketDataProvider`]: the fetch capability every data source implements
//! - [`RawBar`] / [`ListedSymbol`]: loosely-typed rows exactly as a source returns them
//! - [`MarketDataError`] with [`RetryClass`] classification
//! - [`RateLimiter`] and [`CircuitBreaker`] to protect a source from overload
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  Ingestion (core)|   normalizes + validates
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |   RateLimiter    | --> |  CircuitBreaker  |
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (TWSE, CSV directory)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |     RawBar       |
//! +------------------+
//! ```
//!
//! Providers never parse prices into numeric types. Shaping raw rows into
//! validated bars is the ingestion layer's job.

pub mod errors;
pub mod models;
pub mod provider;
pub mod resilience;

pub use errors::{MarketDataError, RetryClass};
pub use models::{ListedSymbol, RawBar};
pub use provider::csv_dir::CsvDirectoryProvider;
pub use provider::twse::TwseProvider;
pub use provider::{month_ranges, MarketDataProvider, RateLimit};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RateLimiter};
