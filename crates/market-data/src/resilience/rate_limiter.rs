//! Token bucket rate limiter for a data source.
//!
//! The bucket starts full (`burst` tokens) and refills continuously at
//! `requests_per_minute / 60` tokens per second. Time comes from tokio's
//! clock, so paused-clock tests see the same pacing as production.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use log::{debug, warn};

use crate::provider::RateLimit;

/// Token bucket state.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    fn new(requests_per_minute: u32, capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: requests_per_minute.max(1) as f64 / 60.0,
            capacity,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait time until a token becomes available.
    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Rate limiter for one source, shared by every concurrent fetch against it.
pub struct RateLimiter {
    source: String,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(source: impl Into<String>, limit: &RateLimit) -> Self {
        Self {
            source: source.into(),
            bucket: Mutex::new(TokenBucket::new(
                limit.requests_per_minute,
                limit.burst.max(1) as f64,
            )),
        }
    }

    /// Lock the bucket, recovering from poison.
    ///
    /// A poisoned bucket only means slightly wrong pacing.
    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex for '{}' was poisoned, recovering", self.source);
            poisoned.into_inner()
        })
    }

    /// Wait (asynchronously) until a token is available, then take it.
    pub async fn acquire(&self) {
        loop {
            let wait_time = {
                let mut bucket = self.lock_bucket();
                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };

            if wait_time > Duration::ZERO {
                debug!("Rate limiter: waiting {:?} for '{}'", wait_time, self.source);
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.lock_bucket().try_acquire()
    }

    pub fn remaining_tokens(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        bucket.refill();
        bucket.tokens
    }
}
