//! Stockbase Core - Domain entities, services, and traits.
//!
//! This crate holds the ingestion, maintenance and query logic of the stock
//! database. It is database-agnostic: storage is reached only through the
//! store traits, which the `storage-sqlite` crate implements.

pub mod bars;
pub mod calendar;
pub mod constants;
pub mod errors;
pub mod ingestion;
pub mod maintenance;
pub mod query;
pub mod symbols;

#[cfg(test)]
pub(crate) mod testing;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
