//! Raw source rows to `Bar`.
//!
//! Providers hand back strings exactly as published. Everything past this
//! module works on typed bars only.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use stockbase_market_data::RawBar;

use crate::bars::Bar;

/// Values sources print in place of a price when there was no trade.
const PLACEHOLDERS: [&str; 4] = ["", "--", "---", "X"];

/// Offset between ROC (Minguo) and Gregorian years.
const ROC_YEAR_OFFSET: i32 = 1911;

/// Rows that survived normalization plus the count that did not.
#[derive(Debug, Default)]
pub struct Normalized {
    pub bars: Vec<Bar>,
    pub invalid: usize,
}

/// Parse `YYYY-MM-DD`, `YYYYMMDD`, `YYYY/MM/DD` or ROC `YYY/MM/DD`.
pub fn parse_trade_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok();
    }

    let mut parts = value.split('/');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let mut year: i32 = year.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u32 = day.trim().parse().ok()?;
    if year < 1000 {
        year += ROC_YEAR_OFFSET;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn clean_number(raw: &str) -> Option<String> {
    let value = raw.trim();
    if PLACEHOLDERS.contains(&value) {
        return None;
    }
    let cleaned: String = value.chars().filter(|c| *c != ',').collect();
    Some(cleaned.trim_start_matches('+').to_string())
}

/// Parse a price, tolerating thousands separators. Placeholders yield `None`.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned = clean_number(raw)?;
    Decimal::from_str(&cleaned).ok()
}

/// Parse a share count. Fractional values are truncated.
pub fn parse_volume(raw: &str) -> Option<i64> {
    let cleaned = clean_number(raw)?;
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    Decimal::from_str(&cleaned).ok()?.trunc().to_i64()
}

fn normalize_row(symbol: &str, row: &RawBar) -> Result<Bar, String> {
    let date = parse_trade_date(&row.date).ok_or_else(|| format!("bad date '{}'", row.date))?;
    let field = |label: &str, value: Option<&str>| {
        value.and_then(parse_price).ok_or_else(|| {
            format!(
                "{} {}: bad {} '{}'",
                symbol,
                date,
                label,
                value.unwrap_or_default()
            )
        })
    };
    let open = field("open", row.open.as_deref())?;
    let high = field("high", row.high.as_deref())?;
    let low = field("low", row.low.as_deref())?;
    let close = field("close", row.close.as_deref())?;
    let volume = match row.volume.as_deref() {
        Some(v) => parse_volume(v)
            .ok_or_else(|| format!("{} {}: bad volume '{}'", symbol, date, v))?,
        None => 0,
    };

    Ok(Bar::new(symbol, date, open, high, low, close, volume))
}

/// Convert raw rows for `symbol`, keeping only dates inside `[start, end]`.
///
/// Unparseable rows and rows outside the range are counted as invalid.
/// Order is preserved.
pub fn normalize_rows(symbol: &str, rows: &[RawBar], start: NaiveDate, end: NaiveDate) -> Normalized {
    let mut normalized = Normalized {
        bars: Vec::with_capacity(rows.len()),
        invalid: 0,
    };

    for row in rows {
        match normalize_row(symbol, row) {
            Ok(bar) if bar.date < start || bar.date > end => {
                debug!(
                    "Dropping {} {}: outside requested range {}..{}",
                    symbol, bar.date, start, end
                );
                normalized.invalid += 1;
            }
            Ok(bar) => normalized.bars.push(bar),
            Err(reason) => {
                warn!("Dropping unreadable row for {}: {}", symbol, reason);
                normalized.invalid += 1;
            }
        }
    }

    normalized
}

/// Collapse rows sharing a date, keeping the last one. Returns the survivors
/// in ascending date order and how many were discarded.
pub fn dedup_by_date(bars: Vec<Bar>) -> (Vec<Bar>, usize) {
    let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
    let mut discarded = 0;

    for bar in bars {
        let date = bar.date;
        if let Some(previous) = by_date.insert(date, bar) {
            warn!(
                "Duplicate row for {} {}, keeping the later one",
                previous.symbol, date
            );
            discarded += 1;
        }
    }

    (by_date.into_values().collect(), discarded)
}
