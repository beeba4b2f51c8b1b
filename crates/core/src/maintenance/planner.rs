//! Per-symbol sync planning.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::TradingCalendar;

/// What to fetch for one symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncPlan {
    /// Nothing stored yet.
    Full { start: NaiveDate, end: NaiveDate },
    /// Continue after the last stored bar.
    Delta { start: NaiveDate, end: NaiveDate },
    /// Earlier history is missing; `delta` also covers new days if any.
    Backfill {
        start: NaiveDate,
        end: NaiveDate,
        delta: Option<(NaiveDate, NaiveDate)>,
    },
    UpToDate,
    /// Missing trading days, each requested on its own.
    Repair { dates: Vec<NaiveDate> },
}

impl SyncPlan {
    pub fn label(&self) -> &'static str {
        match self {
            SyncPlan::Full { .. } => "full",
            SyncPlan::Delta { .. } => "delta",
            SyncPlan::Backfill { .. } => "backfill",
            SyncPlan::UpToDate => "up_to_date",
            SyncPlan::Repair { .. } => "repair",
        }
    }

    /// Ranges to ingest, in order.
    pub fn ranges(&self) -> Vec<(NaiveDate, NaiveDate)> {
        match self {
            SyncPlan::Full { start, end } | SyncPlan::Delta { start, end } => vec![(*start, *end)],
            SyncPlan::Backfill { start, end, delta } => {
                let mut ranges = vec![(*start, *end)];
                ranges.extend(delta.iter().copied());
                ranges
            }
            SyncPlan::UpToDate => Vec::new(),
            SyncPlan::Repair { dates } => dates.iter().map(|d| (*d, *d)).collect(),
        }
    }
}

/// Where a symbol's history stands in storage.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoredSpan {
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Full download when nothing is stored, otherwise a delta that starts the
/// day after the last stored bar so no boundary day is skipped.
pub fn plan_update(span: StoredSpan, history_start: NaiveDate, last_close: NaiveDate) -> SyncPlan {
    match span.last {
        None if history_start > last_close => SyncPlan::UpToDate,
        None => SyncPlan::Full {
            start: history_start,
            end: last_close,
        },
        Some(last) => match last.succ_opt() {
            Some(start) if start <= last_close => SyncPlan::Delta {
                start,
                end: last_close,
            },
            _ => SyncPlan::UpToDate,
        },
    }
}

/// Like `plan_update`, but also backfills history that starts after
/// `history_start` when the calendar has trading days in between.
pub fn plan_download(
    span: StoredSpan,
    history_start: NaiveDate,
    last_close: NaiveDate,
    calendar: &dyn TradingCalendar,
) -> SyncPlan {
    let update = plan_update(span, history_start, last_close);
    let Some(first) = span.first else {
        return update;
    };

    let backfill_end = match first.pred_opt() {
        Some(end) if end >= history_start => end,
        _ => return update,
    };
    if calendar.trading_days(history_start, backfill_end).is_empty() {
        return update;
    }

    let delta = match update {
        SyncPlan::Delta { start, end } => Some((start, end)),
        _ => None,
    };
    SyncPlan::Backfill {
        start: history_start,
        end: backfill_end,
        delta,
    }
}

/// Trading days in `[first, last]` that are neither stored nor in `exhausted`.
pub fn plan_repair(
    calendar: &dyn TradingCalendar,
    first: NaiveDate,
    last: NaiveDate,
    stored: &[NaiveDate],
    exhausted: &HashSet<NaiveDate>,
) -> SyncPlan {
    let stored: HashSet<NaiveDate> = stored.iter().copied().collect();
    let dates: Vec<NaiveDate> = calendar
        .trading_days(first, last)
        .into_iter()
        .filter(|d| !stored.contains(d) && !exhausted.contains(d))
        .collect();

    if dates.is_empty() {
        SyncPlan::UpToDate
    } else {
        SyncPlan::Repair { dates }
    }
}
