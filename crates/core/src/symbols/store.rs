use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{MarketCount, Symbol, SymbolMetadata};
use crate::errors::Result;

/// Persistence contract for the symbol universe.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create the symbol or merge `metadata` into the stored row. Idempotent.
    async fn upsert_symbol(&self, code: &str, metadata: SymbolMetadata) -> Result<Symbol>;

    /// Deactivate without deleting; bars stay queryable.
    async fn mark_inactive(&self, code: &str, reason: &str) -> Result<()>;

    /// Stamp a successful update and clear the last error.
    async fn record_success(&self, code: &str, at: DateTime<Utc>) -> Result<()>;

    async fn record_failure(&self, code: &str, message: &str) -> Result<()>;

    // =========================================================================
    // Queries
    // =========================================================================

    fn get_symbol(&self, code: &str) -> Result<Option<Symbol>>;

    /// All symbols ordered by code.
    fn list_symbols(&self, active_only: bool) -> Result<Vec<Symbol>>;

    /// Symbols whose code or name contains `keyword`.
    fn search_symbols(&self, keyword: &str) -> Result<Vec<Symbol>>;

    fn list_symbols_by_market(&self, market: &str) -> Result<Vec<Symbol>>;

    /// Symbols whose industry equals `industry`, ordered by code.
    fn list_symbols_by_industry(&self, industry: &str) -> Result<Vec<Symbol>>;

    fn market_distribution(&self) -> Result<Vec<MarketCount>>;
}
