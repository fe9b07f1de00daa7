//! Circuit breaker guarding the upstream rates API.
//!
//! - CLOSED: requests flow through
//! - OPEN: requests are rejected without contacting upstream
//! - HALF_OPEN: after the recovery timeout, one trial request is let through

use crate::config::NetworkConfig;
use crate::error::{FxError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait in OPEN before letting a trial through.
    pub recovery_timeout: Duration,
    /// Trial requests allowed while HALF_OPEN.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: NetworkConfig::CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            recovery_timeout: NetworkConfig::CIRCUIT_BREAKER_RECOVERY_TIMEOUT,
            half_open_max_calls: 1,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_calls: u32,
}

/// Circuit breaker for one upstream domain.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
    domain: String,
}

/// Snapshot of a circuit breaker, shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub domain: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_successes: u64,
}

impl CircuitBreaker {
    pub fn new(domain: impl Into<String>) -> Self {
        Self::with_config(domain, CircuitBreakerConfig::default())
    }

    pub fn with_config(domain: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_calls: 0,
            }),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            domain: domain.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // State stays consistent even if a holder panicked mid-update.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state, moving OPEN to HALF_OPEN once the timeout elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Admit a request or fail fast with [`FxError::CircuitBreakerOpen`].
    ///
    /// The returned permit must be settled with [`CircuitPermit::record`].
    /// A permit dropped unsettled (the request was cancelled) gives its
    /// HALF_OPEN slot back.
    pub fn check(&self) -> Result<CircuitPermit<'_>> {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        let (allowed, half_open) = match inner.state {
            CircuitState::Closed => (true, false),
            CircuitState::Open => (false, false),
            CircuitState::HalfOpen => {
                if inner.half_open_calls < self.config.half_open_max_calls {
                    inner.half_open_calls += 1;
                    (true, true)
                } else {
                    (false, false)
                }
            }
        };

        if allowed {
            Ok(CircuitPermit {
                breaker: self,
                half_open,
                settled: false,
            })
        } else {
            Err(FxError::CircuitBreakerOpen {
                domain: self.domain.clone(),
            })
        }
    }

    fn release_half_open_slot(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.half_open_calls > 0 {
            inner.half_open_calls -= 1;
            debug!("Cancelled trial released HALF_OPEN slot for {}", self.domain);
        }
    }

    /// Record the outcome of an admitted request.
    ///
    /// Only failures that indicate an unhealthy upstream count; client-side
    /// errors such as an unknown currency do not trip the breaker.
    pub fn record<T>(&self, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.record_success(),
            Err(err) if err.is_retryable() => self.record_failure(),
            Err(_) => self.record_success(),
        }
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            info!("Circuit breaker for {} recovered to CLOSED", self.domain);
        }
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock();
        inner.consecutive_failures += 1;

        let should_open = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.half_open_calls = 0;
            warn!(
                "Circuit breaker for {} opened after {} failures",
                self.domain, inner.consecutive_failures
            );
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        CircuitBreakerStats {
            domain: self.domain.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
        }
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
        if elapsed >= self.config.recovery_timeout {
            inner.state = CircuitState::HalfOpen;
            inner.half_open_calls = 0;
            debug!("Circuit breaker for {} entering HALF_OPEN", self.domain);
        }
    }
}

/// Admission granted by [`CircuitBreaker::check`].
#[must_use = "settle the permit with `record`"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    half_open: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    /// Settle the permit with the outcome of the admitted request.
    pub fn record<T>(mut self, outcome: &Result<T>) {
        self.settled = true;
        self.breaker.record(outcome);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.half_open {
            self.breaker.release_half_open_slot();
        }
    }
}
