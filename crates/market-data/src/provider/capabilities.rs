//! Rate limiting configuration and request shaping for providers.

use chrono::{Datelike, Months, NaiveDate};

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Requests allowed in a burst before the per-minute rate applies.
    pub burst: u32,

    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,
}

impl RateLimit {
    /// No practical limit, for local sources.
    pub fn unlimited() -> Self {
        Self {
            requests_per_minute: 60_000,
            burst: 1_000,
            max_concurrency: 16,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 10,
            max_concurrency: 5,
        }
    }
}

/// Split `[start, end]` into calendar months, clamped to the range.
///
/// For sources that answer one month per request.
pub fn month_ranges(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut ranges = Vec::new();
    if start > end {
        return ranges;
    }
    let mut current = start.with_day(1);

    while let Some(month) = current {
        if month > end {
            break;
        }
        let next = month.checked_add_months(Months::new(1));
        let month_end = next.and_then(|n| n.pred_opt()).unwrap_or(NaiveDate::MAX);
        ranges.push((month.max(start), month_end.min(end)));
        current = next;
    }

    ranges
}
