//! SQLite storage implementation for Stockbase.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the store traits defined in `stockbase-core` and contains:
//! - Database connection pooling and the single-writer actor
//! - Diesel migrations
//! - Repository implementations for bars, symbols, gaps and metadata
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! ```text
//!   stockbase-core (ingestion, maintenance, query)
//!                  │  BarStore / SymbolStore / GapStore / MetadataStore
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod bars;
pub mod maintenance;
pub mod symbols;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    StorageContext, WriteHandle,
};

pub use bars::BarRepository;
pub use maintenance::MaintenanceRepository;
pub use symbols::SymbolRepository;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from stockbase-core for convenience
pub use stockbase_core::errors::{DatabaseError, Error, Result};
