//! Ingestion and maintenance against a real SQLite file and a CSV source.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use tempfile::tempdir;

use stockbase_core::bars::BarStore;
use stockbase_core::calendar::TwseCalendar;
use stockbase_core::ingestion::{
    IngestionOutcome, IngestionService, IngestionServiceTrait, RetryPolicy, SourceClient,
};
use stockbase_core::maintenance::{
    CancellationFlag, GapStore, MaintenanceConfig, MaintenanceMode, MaintenanceService,
    MetadataStore, SymbolRunStatus,
};
use stockbase_core::query::QueryService;
use stockbase_core::symbols::{SymbolStatus, SymbolStore};
use stockbase_market_data::CsvDirectoryProvider;
use stockbase_storage_sqlite::StorageContext;

const ABC_PRICES: &str = "Date,Open,High,Low,Close,Volume\n\
                          2024-01-01,100,101,99,100,1000\n\
                          2024-01-02,100,102,99,101,1200\n\
                          2024-01-03,101,103,100,102,1100\n\
                          2024-01-04,102,104,101,103,1300\n\
                          2024-01-05,103,105,102,104,900\n";

const XYZ_PRICES: &str = "Date,Open,High,Low,Close,Volume\n\
                          2024-01-02,50,51,49,50,10\n\
                          2024-01-03,11,10,12,11,10\n\
                          2024-01-04,50,52,49,51,10\n\
                          2024-01-05,51,53,50,52,10\n\
                          2024-01-08,52,54,51,53,10\n";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Harness {
    storage: StorageContext,
    ingestion: Arc<IngestionService>,
    maintenance: MaintenanceService,
    query: QueryService,
}

fn write_prices(dir: &Path, symbol: &str, body: &str) {
    fs::write(dir.join(format!("{}_prices.csv", symbol)), body).unwrap();
}

fn harness(db_dir: &Path, data_dir: &Path) -> Harness {
    let storage = StorageContext::open(&db_dir.join("stock.db").to_string_lossy()).unwrap();

    let bar_store: Arc<dyn BarStore> = Arc::new(storage.bar_repository());
    let symbol_store: Arc<dyn SymbolStore> = Arc::new(storage.symbol_repository());
    let maintenance_repository = Arc::new(storage.maintenance_repository());
    let gap_store: Arc<dyn GapStore> = maintenance_repository.clone();
    let metadata_store: Arc<dyn MetadataStore> = maintenance_repository;

    let client = Arc::new(SourceClient::with_retry(
        Arc::new(CsvDirectoryProvider::new(data_dir)),
        RetryPolicy::none(),
    ));
    let ingestion = Arc::new(IngestionService::new(client.clone(), bar_store.clone()));
    let maintenance = MaintenanceService::new(
        ingestion.clone(),
        client,
        bar_store.clone(),
        symbol_store.clone(),
        gap_store.clone(),
        metadata_store.clone(),
        Arc::new(TwseCalendar::new()),
        MaintenanceConfig::default(),
    );
    let query = QueryService::new(bar_store, symbol_store, gap_store, metadata_store);

    Harness {
        storage,
        ingestion,
        maintenance,
        query,
    }
}

#[tokio::test]
async fn test_ingesting_twice_writes_once() {
    let db_dir = tempdir().unwrap();
    let data_dir = tempdir().unwrap();
    write_prices(data_dir.path(), "ABC", ABC_PRICES);
    let h = harness(db_dir.path(), data_dir.path());

    let first = h
        .ingestion
        .ingest("ABC", d(2024, 1, 1), d(2024, 1, 5))
        .await
        .unwrap();
    assert_eq!(first.fetched, 5);
    assert_eq!(first.written, 5);
    assert_eq!(first.outcome, IngestionOutcome::Success);

    let second = h
        .ingestion
        .ingest("ABC", d(2024, 1, 1), d(2024, 1, 5))
        .await
        .unwrap();
    assert_eq!(second.written, 0);
    assert_eq!(second.duplicates_skipped, 5);

    let bars = h.query.get_bars("ABC", d(2024, 1, 1), d(2024, 1, 5)).unwrap();
    assert_eq!(bars.len(), 5);
    assert_eq!(bars[0].date, d(2024, 1, 1));
    assert_eq!(bars[4].close, dec!(104));
}

#[tokio::test]
async fn test_invalid_row_is_skipped_and_the_rest_stored() {
    let db_dir = tempdir().unwrap();
    let data_dir = tempdir().unwrap();
    write_prices(data_dir.path(), "XYZ", XYZ_PRICES);
    let h = harness(db_dir.path(), data_dir.path());

    let result = h
        .ingestion
        .ingest("XYZ", d(2024, 1, 1), d(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(result.written, 4);
    assert_eq!(result.invalid_skipped, 1);
    assert_eq!(result.outcome, IngestionOutcome::Partial);

    let dates: Vec<NaiveDate> = h
        .query
        .get_bars("XYZ", d(2024, 1, 1), d(2024, 1, 31))
        .unwrap()
        .iter()
        .map(|b| b.date)
        .collect();
    assert_eq!(
        dates,
        vec![d(2024, 1, 2), d(2024, 1, 4), d(2024, 1, 5), d(2024, 1, 8)]
    );
}

#[tokio::test]
async fn test_download_run_isolates_unknown_symbol() {
    let db_dir = tempdir().unwrap();
    let data_dir = tempdir().unwrap();
    write_prices(data_dir.path(), "ABC", ABC_PRICES);
    let h = harness(db_dir.path(), data_dir.path());

    let summary = h
        .maintenance
        .run(
            MaintenanceMode::Download,
            Some(vec!["ABC".to_string(), "GONE".to_string()]),
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.rows_written, 5);

    let abc = summary.results.iter().find(|r| r.symbol == "ABC").unwrap();
    assert_eq!(abc.status, SymbolRunStatus::Success);
    let gone = summary.results.iter().find(|r| r.symbol == "GONE").unwrap();
    assert_eq!(gone.status, SymbolRunStatus::Failed);

    let symbols = h.storage.symbol_repository();
    assert_eq!(
        symbols.get_symbol("GONE").unwrap().unwrap().status,
        SymbolStatus::Inactive
    );
    assert!(symbols.get_symbol("ABC").unwrap().unwrap().last_updated_at.is_some());

    let info = h.query.database_info().unwrap();
    assert_eq!(info.total_bars, 5);
    assert_eq!(info.active_symbols, 1);
    assert!(info.last_maintenance_at.is_some());
}

#[tokio::test]
async fn test_reopening_keeps_data() {
    let db_dir = tempdir().unwrap();
    let data_dir = tempdir().unwrap();
    write_prices(data_dir.path(), "ABC", ABC_PRICES);

    {
        let h = harness(db_dir.path(), data_dir.path());
        h.ingestion
            .ingest("ABC", d(2024, 1, 1), d(2024, 1, 5))
            .await
            .unwrap();
    }

    let h = harness(db_dir.path(), data_dir.path());
    let latest = h.query.latest_bar("ABC").unwrap().unwrap();
    assert_eq!(latest.date, d(2024, 1, 5));
}
