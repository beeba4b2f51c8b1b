//! Taiwan Stock Exchange calendar.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{Datelike, NaiveDate};
use log::warn;

use super::{is_weekend, TradingCalendar};

/// Years with a published holiday list.
const FIRST_COVERED_YEAR: i32 = 2019;
const LAST_COVERED_YEAR: i32 = 2025;

/// Weekday market closures.
#[rustfmt::skip]
const HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2019
    (2019, 1, 1), (2019, 1, 31), (2019, 2, 1), (2019, 2, 4), (2019, 2, 5), (2019, 2, 6),
    (2019, 2, 7), (2019, 2, 8), (2019, 2, 28), (2019, 3, 1), (2019, 4, 4), (2019, 4, 5),
    (2019, 5, 1), (2019, 6, 7), (2019, 8, 9), (2019, 9, 13), (2019, 9, 30), (2019, 10, 10),
    (2019, 10, 11),
    // 2020
    (2020, 1, 1), (2020, 1, 21), (2020, 1, 22), (2020, 1, 23), (2020, 1, 24), (2020, 1, 27),
    (2020, 1, 28), (2020, 1, 29), (2020, 2, 28), (2020, 4, 2), (2020, 4, 3), (2020, 5, 1),
    (2020, 6, 25), (2020, 6, 26), (2020, 10, 1), (2020, 10, 2), (2020, 10, 9),
    // 2021
    (2021, 1, 1), (2021, 2, 8), (2021, 2, 9), (2021, 2, 10), (2021, 2, 11), (2021, 2, 12),
    (2021, 2, 15), (2021, 2, 16), (2021, 3, 1), (2021, 4, 2), (2021, 4, 5), (2021, 4, 30),
    (2021, 6, 14), (2021, 9, 20), (2021, 9, 21), (2021, 10, 11), (2021, 12, 31),
    // 2022
    (2022, 1, 27), (2022, 1, 28), (2022, 1, 31), (2022, 2, 1), (2022, 2, 2), (2022, 2, 3),
    (2022, 2, 4), (2022, 2, 28), (2022, 4, 4), (2022, 4, 5), (2022, 5, 2), (2022, 6, 3),
    (2022, 9, 9), (2022, 10, 10),
    // 2023
    (2023, 1, 2), (2023, 1, 18), (2023, 1, 19), (2023, 1, 20), (2023, 1, 23), (2023, 1, 24),
    (2023, 1, 25), (2023, 1, 26), (2023, 1, 27), (2023, 2, 27), (2023, 2, 28), (2023, 4, 3),
    (2023, 4, 4), (2023, 4, 5), (2023, 5, 1), (2023, 6, 22), (2023, 6, 23), (2023, 8, 3),
    (2023, 9, 29), (2023, 10, 9), (2023, 10, 10),
    // 2024
    (2024, 1, 1), (2024, 2, 6), (2024, 2, 7), (2024, 2, 8), (2024, 2, 9), (2024, 2, 12),
    (2024, 2, 13), (2024, 2, 14), (2024, 2, 28), (2024, 4, 4), (2024, 4, 5), (2024, 5, 1),
    (2024, 6, 10), (2024, 7, 24), (2024, 7, 25), (2024, 9, 17), (2024, 10, 2), (2024, 10, 3),
    (2024, 10, 10), (2024, 10, 31),
    // 2025
    (2025, 1, 1), (2025, 1, 23), (2025, 1, 24), (2025, 1, 27), (2025, 1, 28), (2025, 1, 29),
    (2025, 1, 30), (2025, 1, 31), (2025, 2, 28), (2025, 4, 3), (2025, 4, 4), (2025, 5, 1),
    (2025, 5, 30), (2025, 9, 29), (2025, 10, 6), (2025, 10, 10), (2025, 10, 24), (2025, 12, 25),];

/// Weekends plus exchange holidays for covered years.
///
/// Dates outside the covered years are treated as open on every weekday; a
/// warning is logged once per year.
pub struct TwseCalendar {
    holidays: HashSet<NaiveDate>,
    warned_years: Mutex<HashSet<i32>>,
}

impl TwseCalendar {
    pub fn new() -> Self {
        let holidays = HOLIDAYS
            .iter()
            .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
            .collect();
        Self {
            holidays,
            warned_years: Mutex::new(HashSet::new()),
        }
    }

    pub fn covers_year(&self, year: i32) -> bool {
        (FIRST_COVERED_YEAR..=LAST_COVERED_YEAR).contains(&year)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    fn warn_uncovered(&self, year: i32) {
        let mut warned = self
            .warned_years
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if warned.insert(year) {
            warn!(
                "No TWSE holiday list for {}, treating every weekday as a trading day",
                year
            );
        }
    }
}

impl Default for TwseCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingCalendar for TwseCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        if is_weekend(date) {
            return false;
        }
        if !self.covers_year(date.year()) {
            self.warn_uncovered(date.year());
            return true;
        }
        !self.is_holiday(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_new_year_is_closed() {
        let cal = TwseCalendar::new();
        assert!(!cal.is_trading_day(d(2024, 1, 1)));
        assert!(cal.is_trading_day(d(2024, 1, 2)));
    }

    #[test]
    fn test_weekend_is_closed() {
        let cal = TwseCalendar::new();
        assert!(!cal.is_trading_day(d(2024, 1, 6)));
        assert!(!cal.is_trading_day(d(2024, 1, 7)));
    }

    #[test]
    fn test_lunar_new_year_week() {
        let cal = TwseCalendar::new();
        let days = cal.trading_days(d(2024, 2, 5), d(2024, 2, 16));
        // Market closed 2024-02-06 through 2024-02-14
        assert_eq!(days, vec![d(2024, 2, 5), d(2024, 2, 15), d(2024, 2, 16)]);
    }

    #[test]
    fn test_uncovered_year_falls_back_to_weekdays() {
        let cal = TwseCalendar::new();
        assert!(!cal.covers_year(2030));
        // 2030-01-01 is a Tuesday
        assert!(cal.is_trading_day(d(2030, 1, 1)));
        assert!(!cal.is_trading_day(d(2030, 1, 5)));
    }

    #[test]
    fn test_previous_trading_day_skips_holiday() {
        let cal = TwseCalendar::new();
        assert_eq!(cal.previous_trading_day(d(2024, 1, 2)), d(2023, 12, 29));
    }

    #[test]
    fn test_last_close_after_holiday_weekend() {
        let cal = TwseCalendar::new();
        // Taipei 2024-01-01 18:00, a holiday Monday
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(cal.last_market_close_day(now), d(2023, 12, 29));

        // Taipei 2024-01-02 15:00
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap() - Duration::hours(8);
        assert_eq!(cal.last_market_close_day(now), d(2024, 1, 2));
    }
}
