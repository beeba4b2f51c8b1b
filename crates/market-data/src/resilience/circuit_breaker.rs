//! Circuit breaker for a data source.
//!
//! Three states:
//!
//! - **Closed**: requests flow normally.
//! - **Open**: the source kept failing, requests fail fast.
//! - **HalfOpen**: the recovery timeout elapsed, probe requests are let through.
//!
//! State is in-memory and lives as long as the maintenance run.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of successful probes needed to close the circuit from HalfOpen.
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    failure_count: u32,
    half_open_successes: u32,
    last_failure: Option<Instant>,
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait before probing again.
    pub recovery_timeout: Duration,
    /// Successful probes needed to close from HalfOpen.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: HALF_OPEN_SUCCESS_THRESHOLD,
        }
    }
}

/// Thread-safe circuit breaker guarding one source.
pub struct CircuitBreaker {
    source: String,
    circuit: Mutex<Circuit>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_config(source, CircuitBreakerConfig::default())
    }

    pub fn with_config(source: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            source: source.into(),
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_successes: 0,
                last_failure: None,
            }),
            config,
        }
    }

    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex for '{}' was poisoned, recovering", self.source);
            poisoned.into_inner()
        })
    }

    /// Whether a request may be sent now.
    ///
    /// Moves Open -> HalfOpen once the recovery timeout has elapsed.
    pub fn is_allowed(&self) -> bool {
        let mut circuit = self.lock_circuit();

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = circuit
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        self.source
                    );
                    circuit.state = CircuitState::HalfOpen;
                    circuit.half_open_successes = 0;
                }
                recovered
            }
        }
    }

    pub fn record_success(&self) {
        let mut circuit = self.lock_circuit();

        match circuit.state {
            CircuitState::Closed => {
                circuit.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                if circuit.half_open_successes >= self.config.half_open_success_threshold {
                    info!(
                        "Circuit breaker: closing circuit for '{}' after {} successes",
                        self.source, circuit.half_open_successes
                    );
                    circuit.state = CircuitState::Closed;
                    circuit.failure_count = 0;
                    circuit.half_open_successes = 0;
                    circuit.last_failure = None;
                }
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: late success for '{}' while open",
                    self.source
                );
            }
        }
    }

    /// Record a failed request. Any failure while HalfOpen reopens the circuit.
    pub fn record_failure(&self) {
        let mut circuit = self.lock_circuit();

        circuit.failure_count += 1;
        circuit.last_failure = Some(Instant::now());

        match circuit.state {
            CircuitState::Closed => {
                if circuit.failure_count >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        self.source, circuit.failure_count
                    );
                    circuit.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    "Circuit breaker: reopening circuit for '{}' after failed probe",
                    self.source
                );
                circuit.state = CircuitState::Open;
                circuit.half_open_successes = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock_circuit().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_circuit().failure_count
    }
}
