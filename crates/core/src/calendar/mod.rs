//! Trading calendars.
//!
//! A calendar answers which dates a market is open. Gap repair uses it to
//! decide which missing dates are real gaps, and the planner uses it to find
//! the last completed session.

mod twse;

pub use twse::TwseCalendar;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

use crate::constants::{MARKET_CLOSE_HOUR, MARKET_CLOSE_MINUTE, MARKET_UTC_OFFSET_SECS};

/// Longest stretch searched when stepping back to a trading day.
const MAX_LOOKBACK_DAYS: usize = 30;

/// The market's local calendar date at `now`.
pub fn market_today(now: DateTime<Utc>) -> NaiveDate {
    (now.naive_utc() + Duration::seconds(i64::from(MARKET_UTC_OFFSET_SECS))).date()
}

pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// Trading days in `[start, end]`, ascending.
    fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }

    /// Closest trading day strictly before `date`.
    fn previous_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        for _ in 0..MAX_LOOKBACK_DAYS {
            match current.pred_opt() {
                Some(prev) => current = prev,
                None => break,
            }
            if self.is_trading_day(current) {
                return current;
            }
        }
        current
    }

    /// Date of the most recent session whose prices are published.
    ///
    /// Today counts once the local clock passes the market close; before
    /// that, or on a non-trading day, it is the previous trading day.
    fn last_market_close_day(&self, now: DateTime<Utc>) -> NaiveDate {
        let local = now.naive_utc() + Duration::seconds(i64::from(MARKET_UTC_OFFSET_SECS));
        let today = market_today(now);
        let close = NaiveTime::from_hms_opt(MARKET_CLOSE_HOUR, MARKET_CLOSE_MINUTE, 0)
            .unwrap_or(NaiveTime::MIN);

        if self.is_trading_day(today) && local.time() >= close {
            today
        } else {
            self.previous_trading_day(today)
        }
    }
}

pub(crate) fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Monday to Friday, no holidays.
#[derive(Clone, Copy, Debug, Default)]
pub struct WeekdayCalendar;

impl TradingCalendar for WeekdayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date)
    }
}
