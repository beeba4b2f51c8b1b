//! Ingestion: fetch one symbol's range from the source, normalize it and
//! write it idempotently.

mod client;
mod model;
mod normalize;
mod retry;
mod service;


pub use client::SourceClient;
pub use model::{IngestionOutcome, IngestionResult};
pub use normalize::{dedup_by_date, normalize_rows, parse_price, parse_trade_date, parse_volume};
pub use normalize::Normalized;
pub use retry::RetryPolicy;
pub use service::{IngestionService, IngestionServiceTrait};
