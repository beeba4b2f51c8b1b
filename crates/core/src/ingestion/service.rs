use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};

use super::client::SourceClient;
use super::model::{IngestionOutcome, IngestionResult};
use super::normalize::{dedup_by_date, normalize_rows};
use crate::bars::{BarStore, BarValidator};
use crate::errors::{Result, ValidationError};

#[async_trait]
pub trait IngestionServiceTrait: Send + Sync {
    /// Fetch, normalize, validate and store `symbol` for `[start, end]`.
    ///
    /// Running it twice over the same range writes nothing the second time.
    async fn ingest(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<IngestionResult>;

    fn source_id(&self) -> &'static str;
}

pub struct IngestionService {
    client: Arc<SourceClient>,
    bar_store: Arc<dyn BarStore>,
    validator: BarValidator,
}

impl IngestionService {
    pub fn new(client: Arc<SourceClient>, bar_store: Arc<dyn BarStore>) -> Self {
        Self {
            client,
            bar_store,
            validator: BarValidator::default(),
        }
    }

    pub fn with_validator(mut self, validator: BarValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn client(&self) -> &Arc<SourceClient> {
        &self.client
    }
}

#[async_trait]
impl IngestionServiceTrait for IngestionService {
    async fn ingest(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IngestionResult> {
        if start > end {
            return Err(ValidationError::InvalidInput(format!(
                "start {} is after end {} for {}",
                start, end, symbol
            ))
            .into());
        }

        let raw = self.client.fetch_range(symbol, start, end).await?;
        let mut result = IngestionResult::empty(symbol, start, end);
        result.fetched = raw.len();

        if raw.is_empty() {
            debug!("No data for {} {}..{}", symbol, start, end);
            return Ok(result);
        }

        let normalized = normalize_rows(symbol, &raw, start, end);
        result.invalid_skipped += normalized.invalid;

        let (unique, repeated) = dedup_by_date(normalized.bars);
        result.duplicates_skipped += repeated;

        let (valid, rejected) = self.validator.validate_batch(unique);
        for (_, err) in &rejected {
            warn!("Discarding invalid bar: {}", err);
        }
        result.invalid_skipped += rejected.len();

        if !valid.is_empty() {
            let outcome = self.bar_store.upsert_bars(symbol, &valid).await?;
            result.written = outcome.written();
            result.duplicates_skipped += outcome.unchanged;
        }

        if result.invalid_skipped > 0 {
            result.outcome = IngestionOutcome::Partial;
        }

        info!(
            "Ingested {} {}..{}: fetched {}, written {}, duplicates {}, invalid {}",
            symbol,
            start,
            end,
            result.fetched,
            result.written,
            result.duplicates_skipped,
            result.invalid_skipped
        );
        Ok(result)
    }

    fn source_id(&self) -> &'static str {
        self.client.source_id()
    }
}
