//! Circuit breaker around the vectorized Greeks path.
//!
//! Trips on consecutive failures rather than a failure rate: the guarded call
//! is pure CPU work, so a run of failures means the path itself is broken.
//!
//! # State Machine
//!
//! ```text
//! CLOSED → OPEN (N consecutive failures)
//! OPEN → HALF_OPEN (cooldown elapsed)
//! HALF_OPEN → CLOSED (probe succeeds)
//! HALF_OPEN → OPEN (probe fails)
//! ```
//!
//! All transitions happen under one mutex so concurrent ticks see a single
//! consistent state, and only `half_open_probes` callers get a probe permit.
//!
//! # Example
//!
//! ```rust,ignore
//! use greeks_engine::resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new("vectorized", CircuitBreakerConfig::default());
//!
//! if let Some(permit) = breaker.try_acquire() {
//!     match run_batch() {
//!         Ok(result) => breaker.record_success(permit),
//!         Err(e) => breaker.record_failure(permit),
//!     }
//! } else {
//!     // Circuit is open, take the fallback decision
//! }
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observability::{circuit_breaker_state, record_circuit_breaker_rejected, record_circuit_breaker_state};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    /// Circuit is closed, calls flow normally.
    Closed,
    /// Circuit is open, calls are skipped.
    Open,
    /// Circuit is letting a probe through.
    HalfOpen,
}

impl CircuitBreakerState {
    const fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => circuit_breaker_state::CLOSED,
            Self::Open => circuit_breaker_state::OPEN,
            Self::HalfOpen => circuit_breaker_state::HALF_OPEN,
        }
    }
}

impl std::fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time to stay `OPEN` before probing.
    pub cooldown: Duration,
    /// Probe calls allowed while `HALF_OPEN`.
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            half_open_probes: 1,
        }
    }
}

/// Permission to make one guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPermit {
    /// Normal call while `CLOSED`.
    Normal,
    /// Recovery probe while `HALF_OPEN`.
    Probe,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    probes_in_flight: u32,
}

/// Circuit breaker for one execution path.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Path name for logging and metrics.
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
    state_transitions: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in the `CLOSED` state.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let breaker = Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitBreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                last_failure_at: None,
                probes_in_flight: 0,
            }),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
        };
        record_circuit_breaker_state(&breaker.name, CircuitBreakerState::Closed.gauge_value());
        breaker
    }

    /// Path name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current state, applying the cooldown transition if due.
    #[must_use]
    pub fn state(&self) -> CircuitBreakerState {
        let mut inner = self.lock();
        self.check_cooldown(&mut inner);
        inner.state
    }

    /// Ask to make a guarded call.
    ///
    /// Returns `None` when the circuit is `OPEN`, or `HALF_OPEN` with every
    /// probe slot taken.
    pub fn try_acquire(&self) -> Option<CallPermit> {
        let mut inner = self.lock();
        self.check_cooldown(&mut inner);

        let permit = match inner.state {
            CircuitBreakerState::Closed => Some(CallPermit::Normal),
            CircuitBreakerState::Open => None,
            CircuitBreakerState::HalfOpen => {
                if inner.probes_in_flight < self.config.half_open_probes {
                    inner.probes_in_flight += 1;
                    Some(CallPermit::Probe)
                } else {
                    None
                }
            }
        };
        drop(inner);

        if permit.is_none() {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            record_circuit_breaker_rejected(&self.name);
        }
        permit
    }

    /// Return an unused permit, e.g. when the call was rejected as bad input
    /// before the guarded path ran.
    pub fn release(&self, permit: CallPermit) {
        if permit == CallPermit::Probe {
            let mut inner = self.lock();
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
    }

    /// Record a successful call made under `permit`.
    ///
    /// While `HALF_OPEN` only a probe outcome moves the state; a `Normal`
    /// call admitted before the circuit opened is counted and ignored.
    pub fn record_success(&self, permit: CallPermit) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.lock();
        match (inner.state, permit) {
            (CircuitBreakerState::Closed, _) => inner.consecutive_failures = 0,
            (CircuitBreakerState::HalfOpen, CallPermit::Probe) => {
                self.transition(&mut inner, CircuitBreakerState::Closed);
            }
            (CircuitBreakerState::HalfOpen, CallPermit::Normal) | (CircuitBreakerState::Open, _) => {}
        }
    }

    /// Record a failed call made under `permit`.
    pub fn record_failure(&self, permit: CallPermit) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.lock();
        inner.last_failure_at = Some(Utc::now());
        match (inner.state, permit) {
            (CircuitBreakerState::Closed, _) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitBreakerState::Open);
                }
            }
            (CircuitBreakerState::HalfOpen, CallPermit::Probe) => {
                inner.consecutive_failures += 1;
                self.transition(&mut inner, CircuitBreakerState::Open);
            }
            // Stale outcome; the probes in flight decide.
            (CircuitBreakerState::HalfOpen, CallPermit::Normal) => {}
            (CircuitBreakerState::Open, _) => inner.consecutive_failures += 1,
        }
    }

    /// `OPEN` → `HALF_OPEN` once the cooldown has elapsed.
    fn check_cooldown(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitBreakerState::Open
            && inner
                .opened_at
                .is_some_and(|opened| opened.elapsed() >= self.config.cooldown)
        {
            self.transition(inner, CircuitBreakerState::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitBreakerState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.probes_in_flight = 0;

        match to {
            CircuitBreakerState::Open => {
                inner.opened_at = Some(Instant::now());
                tracing::warn!(
                    name = %self.name,
                    from = %from,
                    to = %to,
                    consecutive_failures = inner.consecutive_failures,
                    "Circuit breaker opened"
                );
            }
            CircuitBreakerState::HalfOpen => {
                tracing::info!(name = %self.name, from = %from, to = %to, "Circuit breaker probing");
            }
            CircuitBreakerState::Closed => {
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                tracing::info!(name = %self.name, from = %from, to = %to, "Circuit breaker closed");
            }
        }

        self.state_transitions.fetch_add(1, Ordering::Relaxed);
        record_circuit_breaker_state(&self.name, to.gauge_value());
    }

    /// Point-in-time view of this breaker.
    #[must_use]
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let mut inner = self.lock();
        self.check_cooldown(&mut inner);
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
            state_transitions: self.state_transitions.load(Ordering::Relaxed),
        }
    }

    /// Force the circuit open (operations or tests).
    pub fn force_open(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitBreakerState::Open);
    }

    /// Force the circuit closed (operations or tests).
    pub fn force_close(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitBreakerState::Closed);
    }
}

/// Observable state of one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerSnapshot {
    /// Path name.
    pub name: String,
    /// Current state.
    pub state: CircuitBreakerState,
    /// Current run of failures.
    pub consecutive_failures: u32,
    /// Time of the most recent failure.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Calls with a recorded outcome.
    pub total_calls: u64,
    /// Failed calls.
    pub total_failures: u64,
    /// Calls refused by the breaker.
    pub total_rejections: u64,
    /// State changes since creation.
    pub state_transitions: u64,
}
