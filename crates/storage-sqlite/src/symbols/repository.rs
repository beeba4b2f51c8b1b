use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sqlite::SqliteConnection;
use log::info;
use std::sync::Arc;

use super::model::{MarketCountRow, SymbolDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::symbols::dsl as symbols_dsl;
use stockbase_core::errors::DatabaseError;
use stockbase_core::symbols::{MarketCount, Symbol, SymbolMetadata, SymbolStatus, SymbolStore};
use stockbase_core::Result;

pub struct SymbolRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SymbolRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Apply `changes` to one row; a missing row is `NotFound`.
    async fn update_row<F>(&self, code: &str, changes: F) -> Result<()>
    where
        F: FnOnce(&mut SqliteConnection, &str) -> QueryResult<usize> + Send + 'static,
    {
        let code_owned = code.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let affected = changes(conn, &code_owned).map_err(StorageError::QueryFailed)?;
                if affected == 0 {
                    return Err(DatabaseError::NotFound(format!("symbol {}", code_owned)).into());
                }
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl SymbolStore for SymbolRepository {
    // =========================================================================
    // Mutations
    // =========================================================================

    async fn upsert_symbol(&self, code: &str, metadata: SymbolMetadata) -> Result<Symbol> {
        let code_owned = code.trim().to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Symbol> {
                let existing = symbols_dsl::symbols
                    .find(&code_owned)
                    .select(SymbolDB::as_select())
                    .first::<SymbolDB>(conn)
                    .optional()
                    .map_err(StorageError::QueryFailed)?;

                let symbol = match existing {
                    Some(row) => {
                        let mut symbol = Symbol::from(row);
                        metadata.apply_to(&mut symbol);
                        symbol
                    }
                    None => metadata.into_symbol(&code_owned, Utc::now()),
                };

                diesel::replace_into(symbols_dsl::symbols)
                    .values(SymbolDB::from(&symbol))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;

                Ok(symbol)
            })
            .await
    }

    async fn mark_inactive(&self, code: &str, reason: &str) -> Result<()> {
        let reason = reason.to_string();
        self.update_row(code, move |conn, code| {
            diesel::update(symbols_dsl::symbols.find(code))
                .set((
                    symbols_dsl::status.eq(SymbolStatus::Inactive.as_str()),
                    symbols_dsl::last_error.eq(Some(reason)),
                    symbols_dsl::updated_at.eq(Utc::now().to_rfc3339()),
                ))
                .execute(conn)
        })
        .await?;
        info!("Marked symbol {} inactive", code);
        Ok(())
    }

    async fn record_success(&self, code: &str, at: DateTime<Utc>) -> Result<()> {
        self.update_row(code, move |conn, code| {
            diesel::update(symbols_dsl::symbols.find(code))
                .set((
                    symbols_dsl::last_updated_at.eq(Some(at.to_rfc3339())),
                    symbols_dsl::last_error.eq(None::<String>),
                    symbols_dsl::updated_at.eq(Utc::now().to_rfc3339()),
                ))
                .execute(conn)
        })
        .await
    }

    async fn record_failure(&self, code: &str, message: &str) -> Result<()> {
        let message = message.to_string();
        self.update_row(code, move |conn, code| {
            diesel::update(symbols_dsl::symbols.find(code))
                .set((
                    symbols_dsl::last_error.eq(Some(message)),
                    symbols_dsl::updated_at.eq(Utc::now().to_rfc3339()),
                ))
                .execute(conn)
        })
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn get_symbol(&self, code: &str) -> Result<Option<Symbol>> {
        let mut conn = get_connection(&self.pool)?;

        let row = symbols_dsl::symbols
            .find(code)
            .select(SymbolDB::as_select())
            .first::<SymbolDB>(&mut conn)
            .optional()
            .into_core()?;

        Ok(row.map(Symbol::from))
    }

    fn list_symbols(&self, active_only: bool) -> Result<Vec<Symbol>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = symbols_dsl::symbols
            .select(SymbolDB::as_select())
            .order(symbols_dsl::code.asc())
            .into_boxed();

        if active_only {
            query = query.filter(symbols_dsl::status.eq(SymbolStatus::Active.as_str()));
        }

        let rows = query.load::<SymbolDB>(&mut conn).into_core()?;
        Ok(rows.into_iter().map(Symbol::from).collect())
    }

    fn search_symbols(&self, keyword: &str) -> Result<Vec<Symbol>> {
        let mut conn = get_connection(&self.pool)?;
        let pattern = format!("%{}%", keyword.trim());

        let rows = symbols_dsl::symbols
            .filter(
                symbols_dsl::code
                    .like(&pattern)
                    .or(symbols_dsl::name.like(&pattern)),
            )
            .order(symbols_dsl::code.asc())
            .select(SymbolDB::as_select())
            .load::<SymbolDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(Symbol::from).collect())
    }

    fn list_symbols_by_market(&self, market: &str) -> Result<Vec<Symbol>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = symbols_dsl::symbols
            .filter(symbols_dsl::market.eq(market))
            .order(symbols_dsl::code.asc())
            .select(SymbolDB::as_select())
            .load::<SymbolDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(Symbol::from).collect())
    }

    fn list_symbols_by_industry(&self, industry: &str) -> Result<Vec<Symbol>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = symbols_dsl::symbols
            .filter(symbols_dsl::industry.eq(industry))
            .order(symbols_dsl::code.asc())
            .select(SymbolDB::as_select())
            .load::<SymbolDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(Symbol::from).collect())
    }

    fn market_distribution(&self) -> Result<Vec<MarketCount>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = sql_query(
            "SELECT COALESCE(market, 'unknown') AS market, COUNT(*) AS count \
             FROM symbols \
             GROUP BY COALESCE(market, 'unknown') \
             ORDER BY market",
        )
        .load::<MarketCountRow>(&mut conn)
        .into_core()?;

        Ok(rows.into_iter().map(MarketCount::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use stockbase_core::Error;
    use tempfile::tempdir;

    fn create_test_repository() -> (SymbolRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer((*pool).clone());

        (SymbolRepository::new(Arc::clone(&pool), writer), dir)
    }

    fn metadata(name: &str, market: &str) -> SymbolMetadata {
        SymbolMetadata {
            name: Some(name.to_string()),
            market: Some(market.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_symbol_is_idempotent_and_merges() {
        let (repo, _dir) = create_test_repository();

        let created = repo
            .upsert_symbol("2330", metadata("台積電", "tse"))
            .await
            .unwrap();
        repo.upsert_symbol("2330", metadata("台積電", "tse"))
            .await
            .unwrap();
        assert_eq!(repo.list_symbols(false).unwrap().len(), 1);

        // A sparse update keeps what it does not mention.
        let merged = repo
            .upsert_symbol(
                "2330",
                SymbolMetadata {
                    industry: Some("半導體業".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.name.as_deref(), Some("台積電"));
        assert_eq!(merged.industry.as_deref(), Some("半導體業"));
        assert_eq!(merged.created_at, created.created_at);

        let stored = repo.get_symbol("2330").unwrap().unwrap();
        assert_eq!(stored, merged);
    }

    #[tokio::test]
    async fn test_mark_inactive_keeps_row() {
        let (repo, _dir) = create_test_repository();
        repo.upsert_symbol("1101", metadata("台泥", "tse"))
            .await
            .unwrap();
        repo.upsert_symbol("2330", metadata("台積電", "tse"))
            .await
            .unwrap();

        repo.mark_inactive("1101", "delisted").await.unwrap();

        let active: Vec<String> = repo
            .list_symbols(true)
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(active, vec!["2330"]);

        let inactive = repo.get_symbol("1101").unwrap().unwrap();
        assert_eq!(inactive.status, SymbolStatus::Inactive);
        assert_eq!(inactive.last_error.as_deref(), Some("delisted"));

        // Upserting from a listing reactivates.
        repo.upsert_symbol(
            "1101",
            SymbolMetadata {
                status: Some(SymbolStatus::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(repo.get_symbol("1101").unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_record_success_clears_error() {
        let (repo, _dir) = create_test_repository();
        repo.upsert_symbol("2330", SymbolMetadata::default())
            .await
            .unwrap();

        repo.record_failure("2330", "timeout").await.unwrap();
        assert_eq!(
            repo.get_symbol("2330").unwrap().unwrap().last_error.as_deref(),
            Some("timeout")
        );

        let at = Utc::now();
        repo.record_success("2330", at).await.unwrap();
        let symbol = repo.get_symbol("2330").unwrap().unwrap();
        assert!(symbol.last_error.is_none());
        assert_eq!(
            symbol.last_updated_at.map(|t| t.timestamp()),
            Some(at.timestamp())
        );
    }

    #[tokio::test]
    async fn test_updating_unknown_symbol_is_not_found() {
        let (repo, _dir) = create_test_repository();
        let err = repo.mark_inactive("9999", "gone").await.unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_and_market_queries() {
        let (repo, _dir) = create_test_repository();
        repo.upsert_symbol("2330", metadata("台積電", "tse"))
            .await
            .unwrap();
        repo.upsert_symbol("2303", metadata("聯電", "tse"))
            .await
            .unwrap();
        repo.upsert_symbol("6488", metadata("環球晶", "otc"))
            .await
            .unwrap();
        repo.upsert_symbol("9999", SymbolMetadata::default())
            .await
            .unwrap();

        let by_code: Vec<String> = repo
            .search_symbols("23")
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(by_code, vec!["2303", "2330"]);

        let by_name = repo.search_symbols("積電").unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].code, "2330");

        assert_eq!(repo.list_symbols_by_market("otc").unwrap().len(), 1);

        let distribution = repo.market_distribution().unwrap();
        assert_eq!(
            distribution,
            vec![
                MarketCount { market: "otc".to_string(), count: 1 },
                MarketCount { market: "tse".to_string(), count: 2 },
                MarketCount { market: "unknown".to_string(), count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_symbols_by_industry() {
        let (repo, _dir) = create_test_repository();
        for (code, industry) in [("2330", "半導體業"), ("2303", "半導體業"), ("2603", "航運業")] {
            repo.upsert_symbol(
                code,
                SymbolMetadata {
                    industry: Some(industry.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        repo.upsert_symbol("9999", SymbolMetadata::default())
            .await
            .unwrap();

        let codes: Vec<String> = repo
            .list_symbols_by_industry("半導體業")
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(codes, vec!["2303", "2330"]);
        assert!(repo.list_symbols_by_industry("半導體").unwrap().is_empty());
    }
}
