//! Tests for `MaintenanceService`.
//!
//! Covered behavior:
//! 1. Full download then delta, with no day lost at the boundary
//! 2. One failing symbol never aborts the run
//! 3. Cancellation marks unstarted symbols as cancelled
//! 4. Gap repair fills what it can, records the rest, and stops retrying
//! 5. Pruning and listing sync, limited to the markets a listing covers

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::bars::{Bar, BarStore};
    use crate::calendar::TwseCalendar;
    use crate::constants::{META_LAST_MAINTENANCE_AT, META_LAST_MAINTENANCE_MODE};
    use crate::ingestion::{IngestionService, RetryPolicy, SourceClient};
    use crate::maintenance::{
        CancellationFlag, GapStore, MaintenanceConfig, MaintenanceMode, MaintenanceService,
        MetadataStore, SymbolRunStatus,
    };
    use crate::symbols::{SymbolStatus, SymbolStore};
    use crate::testing::{
        d, raw_day, MockBarStore, MockGapStore, MockMetadataStore, MockSymbolStore,
        ScriptedProvider,
    };
    use rust_decimal_macros::dec;

    #[derive(Clone)]
    struct Stores {
        bars: MockBarStore,
        symbols: MockSymbolStore,
        gaps: MockGapStore,
        meta: MockMetadataStore,
    }

    impl Stores {
        fn with_active(codes: &[&str]) -> Self {
            Self {
                bars: MockBarStore::new(),
                symbols: MockSymbolStore::with_active(codes),
                gaps: MockGapStore::new(),
                meta: MockMetadataStore::new(),
            }
        }
    }

    /// 15:00 in Taipei on the given day.
    fn after_close(y: i32, m: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, 7, 0, 0).unwrap()
    }

    fn build(
        provider: Arc<ScriptedProvider>,
        stores: &Stores,
        now: DateTime<Utc>,
        concurrency: usize,
    ) -> MaintenanceService {
        let client = Arc::new(SourceClient::with_retry(provider, RetryPolicy::none()));
        let ingestion = Arc::new(IngestionService::new(
            client.clone(),
            Arc::new(stores.bars.clone()),
        ));
        MaintenanceService::new(
            ingestion,
            client,
            Arc::new(stores.bars.clone()),
            Arc::new(stores.symbols.clone()),
            Arc::new(stores.gaps.clone()),
            Arc::new(stores.meta.clone()),
            Arc::new(TwseCalendar::new()),
            MaintenanceConfig {
                concurrency,
                ..MaintenanceConfig::default()
            },
        )
        .with_clock(move || now)
    }

    fn week_rows() -> Vec<stockbase_market_data::RawBar> {
        vec![
            raw_day("2024-01-02", "10"),
            raw_day("2024-01-03", "11"),
            raw_day("2024-01-04", "12"),
            raw_day("2024-01-05", "13"),
            raw_day("2024-01-08", "14"),
        ]
    }

    #[tokio::test]
    async fn test_full_then_delta_has_no_boundary_gap() {
        let provider = Arc::new(ScriptedProvider::new().with_rows("ABC", week_rows()));
        let stores = Stores::with_active(&["ABC"]);
        let cancel = CancellationFlag::new();

        let first = build(provider.clone(), &stores, after_close(2024, 1, 5), 2)
            .run(MaintenanceMode::Update, None, &cancel)
            .await
            .unwrap();
        assert_eq!(first.rows_written, 4);
        assert_eq!(first.results[0].plan.as_deref(), Some("full"));

        let second = build(provider.clone(), &stores, after_close(2024, 1, 8), 2)
            .run(MaintenanceMode::Update, None, &cancel)
            .await
            .unwrap();
        assert_eq!(second.rows_written, 1);
        assert_eq!(second.results[0].plan.as_deref(), Some("delta"));

        assert_eq!(
            provider.calls("ABC"),
            vec![
                (d(2013, 1, 1), d(2024, 1, 5)),
                (d(2024, 1, 6), d(2024, 1, 8)),
            ]
        );
        assert_eq!(stores.bars.all("ABC").len(), 5);
    }

    #[tokio::test]
    async fn test_up_to_date_symbol_is_skipped() {
        let provider = Arc::new(ScriptedProvider::new().with_rows("ABC", week_rows()));
        let stores = Stores::with_active(&["ABC"]);
        let svc = build(provider.clone(), &stores, after_close(2024, 1, 8), 2);
        let cancel = CancellationFlag::new();

        svc.run(MaintenanceMode::Update, None, &cancel).await.unwrap();
        let rerun = svc.run(MaintenanceMode::Update, None, &cancel).await.unwrap();

        assert_eq!(rerun.skipped, 1);
        assert_eq!(rerun.rows_written, 0);
        assert_eq!(rerun.results[0].status, SymbolRunStatus::UpToDate);
        assert_eq!(provider.call_count("ABC"), 1);
    }

    #[tokio::test]
    async fn test_failing_symbol_does_not_abort_run() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_rows("AAA", week_rows())
                .with_unavailable("BBB")
                .with_rows("CCC", week_rows()),
        );
        let stores = Stores::with_active(&["AAA", "BBB", "CCC"]);
        let svc = build(provider, &stores, after_close(2024, 1, 8), 2);

        let summary = svc
            .run(MaintenanceMode::Download, None, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
        assert_eq!(summary.rows_written, 10);

        let failed: Vec<&str> = summary.failures().map(|r| r.symbol.as_str()).collect();
        assert_eq!(failed, vec!["BBB"]);

        let bbb = stores.symbols.get("BBB").unwrap();
        assert!(bbb.last_error.unwrap().contains("Source unavailable"));
        assert!(bbb.last_updated_at.is_none());
        assert!(stores.symbols.get("AAA").unwrap().last_updated_at.is_some());
        assert_eq!(stores.bars.all("CCC").len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_deactivated() {
        let provider = Arc::new(ScriptedProvider::new().with_unknown("GONE"));
        let stores = Stores::with_active(&["GONE"]);
        let svc = build(provider, &stores, after_close(2024, 1, 8), 1);

        let summary = svc
            .run(MaintenanceMode::Update, None, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(
            stores.symbols.get("GONE").unwrap().status,
            SymbolStatus::Inactive
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_starts_nothing() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_rows("AAA", week_rows())
                .with_rows("BBB", week_rows()),
        );
        let stores = Stores::with_active(&["AAA", "BBB"]);
        let svc = build(provider.clone(), &stores, after_close(2024, 1, 8), 1);

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let summary = svc.run(MaintenanceMode::Update, None, &cancel).await.unwrap();

        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.processed, 0);
        assert!(summary.is_success());
        assert_eq!(provider.call_count("AAA") + provider.call_count("BBB"), 0);
        assert!(summary
            .results
            .iter()
            .all(|r| r.status == SymbolRunStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_explicit_symbols_are_registered() {
        let provider = Arc::new(ScriptedProvider::new().with_rows("NEW", week_rows()));
        let stores = Stores::with_active(&[]);
        let svc = build(provider, &stores, after_close(2024, 1, 8), 2);

        let summary = svc
            .run(
                MaintenanceMode::Download,
                Some(vec!["NEW".to_string(), "NEW".to_string()]),
                &CancellationFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.rows_written, 5);
        assert!(stores.symbols.get("NEW").is_some());
    }

    #[tokio::test]
    async fn test_run_records_last_maintenance() {
        let stores = Stores::with_active(&[]);
        let now = after_close(2024, 1, 8);
        let svc = build(Arc::new(ScriptedProvider::new()), &stores, now, 2);

        svc.run(MaintenanceMode::Repair, None, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(
            stores.meta.get_metadata(META_LAST_MAINTENANCE_AT).unwrap(),
            Some(now.to_rfc3339())
        );
        assert_eq!(
            stores.meta.get_metadata(META_LAST_MAINTENANCE_MODE).unwrap(),
            Some("repair".to_string())
        );
    }

    fn stored(date: chrono::NaiveDate) -> Bar {
        Bar::new("ABC", date, dec!(10), dec!(10), dec!(10), dec!(10), 100)
    }

    #[tokio::test]
    async fn test_repair_fills_missing_days_and_records_gaps() {
        let provider = Arc::new(
            ScriptedProvider::new().with_rows("ABC", vec![raw_day("2024-03-05", "10")]),
        );
        let stores = Stores::with_active(&["ABC"]);
        stores.bars.insert_raw(vec![
            stored(d(2024, 3, 1)),
            stored(d(2024, 3, 4)),
            stored(d(2024, 3, 7)),
        ]);
        let svc = build(provider.clone(), &stores, after_close(2024, 3, 8), 1);
        let cancel = CancellationFlag::new();

        let summary = svc.run(MaintenanceMode::Repair, None, &cancel).await.unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.gaps_open, 1);
        assert_eq!(summary.results[0].status, SymbolRunStatus::Partial);
        assert_eq!(
            provider.calls("ABC"),
            vec![(d(2024, 3, 5), d(2024, 3, 5)), (d(2024, 3, 6), d(2024, 3, 6))]
        );

        let gaps = stores.gaps.list_gaps("ABC").unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].date, d(2024, 3, 6));
        assert_eq!(gaps[0].attempts, 1);

        // Two more failed attempts exhaust the gap; after that it is left alone.
        svc.run(MaintenanceMode::Repair, None, &cancel).await.unwrap();
        svc.run(MaintenanceMode::Repair, None, &cancel).await.unwrap();
        assert_eq!(stores.gaps.list_gaps("ABC").unwrap()[0].attempts, 3);

        let calls_before = provider.call_count("ABC");
        let last = svc.run(MaintenanceMode::Repair, None, &cancel).await.unwrap();
        assert_eq!(provider.call_count("ABC"), calls_before);
        assert_eq!(last.results[0].status, SymbolRunStatus::UpToDate);
    }

    #[tokio::test]
    async fn test_repair_keeps_gap_when_kept_row_is_invalid() {
        // The later 2024-03-05 row wins the dedup and fails validation.
        let provider = Arc::new(ScriptedProvider::new().with_rows(
            "ABC",
            vec![
                raw_day("2024-03-05", "10"),
                stockbase_market_data::RawBar::ohlcv("2024-03-05", "10", "9", "11", "10", "1000"),
            ],
        ));
        let stores = Stores::with_active(&["ABC"]);
        stores
            .bars
            .insert_raw(vec![stored(d(2024, 3, 4)), stored(d(2024, 3, 6))]);
        let svc = build(provider, &stores, after_close(2024, 3, 6), 1);

        let summary = svc
            .run(MaintenanceMode::Repair, None, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(summary.rows_written, 0);
        assert_eq!(summary.gaps_open, 1);
        let gaps = stores.gaps.list_gaps("ABC").unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].date, d(2024, 3, 5));
        assert!(stores
            .bars
            .get_bars("ABC", d(2024, 3, 5), d(2024, 3, 5))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_repair_failure_records_gap_with_error() {
        let provider = Arc::new(ScriptedProvider::new().with_unavailable("ABC"));
        let stores = Stores::with_active(&["ABC"]);
        stores
            .bars
            .insert_raw(vec![stored(d(2024, 3, 4)), stored(d(2024, 3, 6))]);
        let svc = build(provider, &stores, after_close(2024, 3, 8), 1);

        let summary = svc
            .run(MaintenanceMode::Repair, None, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        let gaps = stores.gaps.list_gaps("ABC").unwrap();
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].last_error.is_some());
    }

    #[tokio::test]
    async fn test_prune_deactivates_unlisted_symbols() {
        let provider = Arc::new(ScriptedProvider::new().with_listing(&["AAA", "CCC"]));
        let stores = Stores::with_active(&["AAA", "BBB", "CCC"]);
        let svc = build(provider, &stores, after_close(2024, 1, 8), 2);

        let summary = svc.prune().await.unwrap();

        assert!(summary.listing_available);
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.deactivated, vec!["BBB".to_string()]);
        let active: Vec<String> = stores
            .symbols
            .list_symbols(true)
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(active, vec!["AAA".to_string(), "CCC".to_string()]);
    }

    #[tokio::test]
    async fn test_prune_leaves_markets_outside_the_listing() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_listing(&["2330"])
                .with_markets(&["tse"]),
        );
        let stores = Stores::with_active(&[]);
        let symbols = [("2330", "tse"), ("2303", "tse"), ("6488", "otc"), ("7556", "esb")];
        for (code, market) in symbols {
            stores
                .symbols
                .upsert_symbol(
                    code,
                    crate::symbols::SymbolMetadata {
                        market: Some(market.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        stores.symbols.upsert_symbol("9999", Default::default()).await.unwrap();
        let svc = build(provider, &stores, after_close(2024, 1, 8), 2);

        let summary = svc.prune().await.unwrap();

        assert_eq!(summary.checked, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.deactivated, vec!["2303".to_string(), "9999".to_string()]);
        assert!(stores.symbols.get("6488").unwrap().is_active());
        assert!(stores.symbols.get("7556").unwrap().is_active());
    }

    #[tokio::test]
    async fn test_prune_with_empty_listing_changes_nothing() {
        let provider = Arc::new(ScriptedProvider::new().with_listing(&[]));
        let stores = Stores::with_active(&["AAA"]);
        let svc = build(provider, &stores, after_close(2024, 1, 8), 2);

        let summary = svc.prune().await.unwrap();
        assert!(summary.deactivated.is_empty());
        assert!(stores.symbols.get("AAA").unwrap().is_active());
    }

    #[tokio::test]
    async fn test_prune_without_listing_support() {
        let stores = Stores::with_active(&["AAA"]);
        let svc = build(Arc::new(ScriptedProvider::new()), &stores, after_close(2024, 1, 8), 2);

        let summary = svc.prune().await.unwrap();
        assert!(!summary.listing_available);
        assert_eq!(summary.checked, 0);
    }

    #[tokio::test]
    async fn test_sync_symbols_upserts_listing() {
        let provider = Arc::new(ScriptedProvider::new().with_listing(&["2330", "2317"]));
        let stores = Stores::with_active(&[]);
        stores
            .symbols
            .upsert_symbol(
                "2317",
                crate::symbols::SymbolMetadata {
                    status: Some(SymbolStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let svc = build(provider, &stores, after_close(2024, 1, 8), 2);

        assert_eq!(svc.sync_symbols().await.unwrap(), 2);
        assert_eq!(stores.symbols.list_symbols(true).unwrap().len(), 2);
    }
}
