//! SQLite helpers.

use chrono::{DateTime, NaiveDate, Utc};

/// Largest `IN (...)` list sent in one statement.
///
/// Stays well below SQLite's bound-parameter limit with room for the other
/// parameters of the query.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Split `items` for queries with an `IN (...)` clause.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
