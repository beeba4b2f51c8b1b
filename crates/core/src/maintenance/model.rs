use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, ValidationError};
use crate::ingestion::IngestionResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceMode {
    /// Full history for new symbols, delta for the rest, plus a backfill
    /// when stored history starts after the listing date.
    Download,
    /// Delta since the last stored bar.
    Update,
    /// Re-request missing trading days inside the stored span.
    Repair,
}

impl MaintenanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceMode::Download => "download",
            MaintenanceMode::Update => "update",
            MaintenanceMode::Repair => "repair",
        }
    }
}

impl fmt::Display for MaintenanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "download" => Ok(MaintenanceMode::Download),
            "update" => Ok(MaintenanceMode::Update),
            "repair" => Ok(MaintenanceMode::Repair),
            other => Err(ValidationError::InvalidInput(format!(
                "unknown maintenance mode '{}'",
                other
            ))
            .into()),
        }
    }
}

/// A trading day the source has not supplied yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarGap {
    pub symbol: String,
    pub date: NaiveDate,
    /// Failed attempts so far.
    pub attempts: i32,
    pub last_error: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolRunStatus {
    Success,
    /// Stored, but some rows were invalid or some days are still missing.
    Partial,
    /// Nothing to fetch.
    UpToDate,
    Failed,
    /// Not started because the run was cancelled.
    Cancelled,
}

/// What a run did for one symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRunResult {
    pub symbol: String,
    pub status: SymbolRunStatus,
    /// Plan label, e.g. `full`, `delta`, `repair`
    pub plan: Option<String>,
    pub rows_written: usize,
    pub duplicates_skipped: usize,
    pub invalid_skipped: usize,
    pub gaps_open: usize,
    pub error: Option<String>,
}

impl SymbolRunResult {
    pub fn new(symbol: impl Into<String>, status: SymbolRunStatus) -> Self {
        Self {
            symbol: symbol.into(),
            status,
            plan: None,
            rows_written: 0,
            duplicates_skipped: 0,
            invalid_skipped: 0,
            gaps_open: 0,
            error: None,
        }
    }

    pub fn cancelled(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SymbolRunStatus::Cancelled)
    }

    pub fn failed(symbol: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(symbol, SymbolRunStatus::Failed)
        }
    }

    /// Fold one ingestion call into this symbol's counts.
    pub fn absorb(&mut self, ingestion: &IngestionResult) {
        self.rows_written += ingestion.written;
        self.duplicates_skipped += ingestion.duplicates_skipped;
        self.invalid_skipped += ingestion.invalid_skipped;
    }
}

/// Outcome of a maintenance run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub mode: MaintenanceMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Symbols already up to date.
    pub skipped: usize,
    pub cancelled: usize,
    pub rows_written: usize,
    pub duplicates_skipped: usize,
    pub invalid_skipped: usize,
    pub gaps_open: usize,
    pub results: Vec<SymbolRunResult>,
}

impl RunSummary {
    pub fn new(mode: MaintenanceMode, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            started_at,
            finished_at: None,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            cancelled: 0,
            rows_written: 0,
            duplicates_skipped: 0,
            invalid_skipped: 0,
            gaps_open: 0,
            results: Vec::new(),
        }
    }

    /// True when no symbol failed. Cancelled symbols do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} processed, {} succeeded, {} failed, {} up to date, {} cancelled; \
             {} rows written, {} duplicates, {} invalid, {} gaps open",
            self.mode,
            self.processed,
            self.succeeded,
            self.failed,
            self.skipped,
            self.cancelled,
            self.rows_written,
            self.duplicates_skipped,
            self.invalid_skipped,
            self.gaps_open
        )
    }

    pub fn failures(&self) -> impl Iterator<Item = &SymbolRunResult> {
        self.results
            .iter()
            .filter(|r| r.status == SymbolRunStatus::Failed)
    }

    pub(crate) fn add_result(&mut self, result: SymbolRunResult) {
        match result.status {
            SymbolRunStatus::Cancelled => self.cancelled += 1,
            status => {
                self.processed += 1;
                match status {
                    SymbolRunStatus::Success | SymbolRunStatus::Partial => self.succeeded += 1,
                    SymbolRunStatus::UpToDate => self.skipped += 1,
                    SymbolRunStatus::Failed => self.failed += 1,
                    SymbolRunStatus::Cancelled => {}
                }
            }
        }
        self.rows_written += result.rows_written;
        self.duplicates_skipped += result.duplicates_skipped;
        self.invalid_skipped += result.invalid_skipped;
        self.gaps_open += result.gaps_open;
        self.results.push(result);
    }
}

/// Outcome of `prune`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneSummary {
    /// False when the source cannot list symbols; nothing was checked.
    pub listing_available: bool,
    pub checked: usize,
    /// Active symbols on markets the listing does not cover.
    pub skipped: usize,
    pub deactivated: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_result_aggregates() {
        let mut summary = RunSummary::new(MaintenanceMode::Update, Utc::now());

        let mut ok = SymbolRunResult::new("A", SymbolRunStatus::Success);
        ok.rows_written = 5;
        summary.add_result(ok);
        summary.add_result(SymbolRunResult::new("B", SymbolRunStatus::UpToDate));
        summary.add_result(SymbolRunResult::failed("C", "boom"));
        summary.add_result(SymbolRunResult::cancelled("D"));

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.rows_written, 5);
        assert!(!summary.is_success());
        assert_eq!(summary.failures().count(), 1);
    }

    #[test]
    fn test_mode_round_trips_through_str() {
        for mode in [
            MaintenanceMode::Download,
            MaintenanceMode::Update,
            MaintenanceMode::Repair,
        ] {
            assert_eq!(mode.as_str().parse::<MaintenanceMode>().unwrap(), mode);
        }
        assert!("rebuild".parse::<MaintenanceMode>().is_err());
    }
}
