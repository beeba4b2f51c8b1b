use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, SourceKind};
use stockbase_core::bars::BarStore;
use stockbase_core::calendar::TwseCalendar;
use stockbase_core::ingestion::{IngestionService, RetryPolicy, SourceClient};
use stockbase_core::maintenance::{
    GapStore, MaintenanceConfig, MaintenanceService, MetadataStore,
};
use stockbase_core::query::QueryService;
use stockbase_core::symbols::SymbolStore;
use stockbase_market_data::{CsvDirectoryProvider, MarketDataProvider, TwseProvider};
use stockbase_storage_sqlite::StorageContext;

/// Install the global subscriber. Library `log` records are bridged in.
pub fn init_tracing() {
    let log_format =
        std::env::var("STOCKBASE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub struct AppServices {
    pub storage: StorageContext,
    pub symbol_store: Arc<dyn SymbolStore>,
    pub maintenance: MaintenanceService,
    pub query: QueryService,
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn MarketDataProvider>> {
    let provider: Arc<dyn MarketDataProvider> = match config.source {
        SourceKind::Twse => Arc::new(TwseProvider::new()),
        SourceKind::Csv => {
            let Some(data_dir) = config.data_dir.clone() else {
                bail!("--data-dir (or STOCKBASE_DATA_DIR) is required with --source csv");
            };
            if !data_dir.is_dir() {
                bail!("data directory {} does not exist", data_dir.display());
            }
            Arc::new(CsvDirectoryProvider::new(data_dir))
        }
    };
    Ok(provider)
}

pub fn build_services(config: &Config) -> anyhow::Result<AppServices> {
    let storage = StorageContext::open(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path))?;
    tracing::info!("Database path in use: {}", storage.db_path());

    let bar_store: Arc<dyn BarStore> = Arc::new(storage.bar_repository());
    let symbol_store: Arc<dyn SymbolStore> = Arc::new(storage.symbol_repository());
    let maintenance_repository = Arc::new(storage.maintenance_repository());
    let gap_store: Arc<dyn GapStore> = maintenance_repository.clone();
    let metadata_store: Arc<dyn MetadataStore> = maintenance_repository;

    let provider = build_provider(config)?;
    let retry = RetryPolicy::new(config.max_attempts, config.retry_base_delay);
    let client = Arc::new(SourceClient::with_retry(provider, retry));

    let concurrency = config.concurrency.min(client.max_concurrency()).max(1);
    if concurrency < config.concurrency {
        tracing::info!(
            "Concurrency capped at {} by source {}",
            concurrency,
            client.source_id()
        );
    }

    let ingestion = Arc::new(IngestionService::new(client.clone(), bar_store.clone()));
    let maintenance = MaintenanceService::new(
        ingestion,
        client,
        bar_store.clone(),
        symbol_store.clone(),
        gap_store.clone(),
        metadata_store.clone(),
        Arc::new(TwseCalendar::new()),
        MaintenanceConfig {
            concurrency,
            ..Default::default()
        },
    );
    let query = QueryService::new(bar_store, symbol_store.clone(), gap_store, metadata_store);

    Ok(AppServices {
        storage,
        symbol_store,
        maintenance,
        query,
    })
}
