//! Shared defaults.

use std::time::Duration;

/// Earliest date fetched for a symbol whose listing date is unknown.
pub const DEFAULT_HISTORY_START: (i32, u32, u32) = (2013, 1, 1);

/// Market close used to decide whether today's session is complete.
/// 14:55 is when TPEx publishes OTC prices; TSE prices are out by 13:50.
pub const MARKET_CLOSE_HOUR: u32 = 14;
pub const MARKET_CLOSE_MINUTE: u32 = 55;

/// Taipei is UTC+8 all year.
pub const MARKET_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Attempts per fetch, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First retry delay; doubles on each subsequent attempt.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on a single retry delay.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(8);

/// Symbols processed in parallel by a maintenance run.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// A gap the source failed to fill this many times is no longer requested.
pub const DEFAULT_MAX_GAP_ATTEMPTS: i32 = 3;

/// Metadata key holding the timestamp of the last finished maintenance run.
pub const META_LAST_MAINTENANCE_AT: &str = "last_maintenance_at";

/// Metadata key holding the mode of the last finished maintenance run.
pub const META_LAST_MAINTENANCE_MODE: &str = "last_maintenance_mode";
