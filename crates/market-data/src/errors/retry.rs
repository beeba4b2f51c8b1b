/// Classification for retry policy.
///
/// Used by the source client to decide how to react to a failed fetch.
///
/// | Class | Retry? | Record Circuit Breaker Failure? |
/// |-------|--------|--------------------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes, with exponential backoff | Yes |
/// | `CircuitOpen` | No | No (already recorded) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad symbol, bad payload, or terminal failure.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Transient failure (timeout, 429, 5xx, dropped connection).
    ///
    /// Retried after a growing delay. Each failure is also recorded in the
    /// circuit breaker so that a source that keeps failing gets excluded.
    WithBackoff,

    /// Circuit breaker is open for this source.
    /// Fail fast until the circuit closes.
    CircuitOpen,
}
