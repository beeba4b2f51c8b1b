//! Core error types for Stockbase.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use chrono::{NaiveDate, ParseError as ChronoParseError};
use thiserror::Error;

use stockbase_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type.
///
/// The three kinds callers branch on are `SourceUnavailable` (recoverable per
/// symbol), `Integrity` (rows rejected, nothing stored) and `Database`
/// (write aborted, nothing partially applied).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Integrity violation: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Source unavailable for {symbol}: {reason}")]
    SourceUnavailable { symbol: String, reason: String },

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Market data operation failed: {0}")]
    MarketData(MarketDataError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Translate a provider failure for `symbol` into the core taxonomy.
    pub fn from_source(symbol: &str, err: MarketDataError) -> Self {
        match err {
            MarketDataError::SymbolNotFound(code) => Error::SymbolNotFound(code),
            e if e.is_source_unavailable() => Error::SourceUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            },
            e => Error::MarketData(e),
        }
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Error::SourceUnavailable { .. })
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A foreign key constraint was violated.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// A bar that breaks a domain invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("{symbol} {date}: {reason}")]
    InvalidBar {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("bar for {found} submitted under {expected}")]
    SymbolMismatch { expected: String, found: String },

    #[error("{} invalid bar(s) for {symbol}: {}", .reasons.len(), .reasons.join("; "))]
    RejectedBatch {
        symbol: String,
        reasons: Vec<String>,
    },
}

/// Validation errors for user input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse date/time: {0}")]
    DateTimeParse(#[from] ChronoParseError),
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<ChronoParseError> for Error {
    fn from(err: ChronoParseError) -> Self {
        Error::Validation(ValidationError::DateTimeParse(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_source_maps_unavailable() {
        let err = Error::from_source(
            "2330",
            MarketDataError::Timeout {
                provider: "TWSE".to_string(),
            },
        );
        assert!(err.is_source_unavailable());
        assert_eq!(err.to_string(), "Source unavailable for 2330: Timeout: TWSE");
    }

    #[test]
    fn test_from_source_maps_symbol_not_found() {
        let err = Error::from_source("9999", MarketDataError::SymbolNotFound("9999".into()));
        assert!(matches!(err, Error::SymbolNotFound(code) if code == "9999"));
    }

    #[test]
    fn test_from_source_keeps_other_provider_errors() {
        let err = Error::from_source(
            "2330",
            MarketDataError::MalformedResponse {
                provider: "TWSE".to_string(),
                message: "eof".to_string(),
            },
        );
        assert!(matches!(err, Error::MarketData(_)));
    }

    #[test]
    fn test_rejected_batch_display() {
        let err = IntegrityError::RejectedBatch {
            symbol: "ABC".to_string(),
            reasons: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "2 invalid bar(s) for ABC: a; b");
    }
}
