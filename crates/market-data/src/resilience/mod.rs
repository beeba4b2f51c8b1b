//! Protection for a single data source: request pacing and fail-fast.

mod circuit_breaker;
mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use rate_limiter::RateLimiter;
