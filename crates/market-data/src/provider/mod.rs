//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Rate limiting configuration
//! - Concrete providers: TWSE over HTTP and a local CSV directory
//!
//! The core system never knows which provider it is talking to. New sources
//! are added by implementing `MarketDataProvider`.

mod capabilities;
mod traits;

pub mod csv_dir;
pub mod twse;

pub use capabilities::{month_ranges, RateLimit};
pub use traits::MarketDataProvider;
