//! Circuit breaker and fallback policy tests against the real engines.
//!
//! A row with an overflowing spot/strike ratio makes the vectorized engine
//! fail numerically while the scalar engine still answers, which lets the
//! breaker be driven open without any test doubles.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::NaiveDate;

use greeks_engine::engine::{
    FallbackGuard, GreeksGuard, GuardError, OptionBatch, ScalarEngine, VectorizedEngine,
};
use greeks_engine::models::{ComputationPath, Environment, GreekName, OptionDescriptor, OptionType};
use greeks_engine::pricing::{ModelKind, PricingModel};
use greeks_engine::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState};

const THRESHOLD: u32 = 3;

fn descriptor(strike: f64) -> OptionDescriptor {
    OptionDescriptor {
        exchange: "NSE".to_string(),
        symbol: "RELIANCE".to_string(),
        instrument_type: "OPT".to_string(),
        strike,
        option_type: OptionType::Call,
        expiry: NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
    }
}

fn healthy_batch() -> OptionBatch {
    let mut batch = OptionBatch::new(0.065, GreekName::ALL.to_vec());
    batch.push(descriptor(2500.0), 2510.0, 30.0 / 365.0, 0.25);
    batch
}

fn overflowing_batch() -> OptionBatch {
    let mut batch = OptionBatch::new(0.065, GreekName::ALL.to_vec());
    batch.push(descriptor(f64::MIN_POSITIVE), f64::MAX, 1e-300, 1e-300);
    batch
}

fn guard(environment: Environment, cooldown: Duration) -> GreeksGuard {
    let model = PricingModel::new(ModelKind::BlackScholes);
    FallbackGuard::new(
        VectorizedEngine::new(model, 256),
        ScalarEngine::new(model),
        CircuitBreaker::new(
            "vectorized",
            CircuitBreakerConfig {
                failure_threshold: THRESHOLD,
                cooldown,
                half_open_probes: 1,
            },
        ),
        environment,
    )
}

/// Fail the vectorized path until the breaker opens. Fallback is disabled so
/// every call reaches the primary engine.
fn trip(guard: &GreeksGuard) {
    let batch = overflowing_batch();
    for _ in 0..THRESHOLD {
        let err = guard.execute(&batch, false).unwrap_err();
        assert!(matches!(err, GuardError::Failed { .. }));
    }
    assert_eq!(guard.snapshot().state, CircuitBreakerState::Open);
}

#[test]
fn breaker_opens_after_consecutive_failures() {
    let guard = guard(Environment::NonProduction, Duration::from_secs(60));
    trip(&guard);

    let snapshot = guard.snapshot();
    assert_eq!(snapshot.consecutive_failures, THRESHOLD);
    assert_eq!(snapshot.total_failures, u64::from(THRESHOLD));
    assert!(snapshot.last_failure_at.is_some());
    assert_eq!(guard.primary().stats().failures, u64::from(THRESHOLD));
}

#[test]
fn production_fails_fast_when_open_even_if_fallback_requested() {
    let guard = guard(Environment::Production, Duration::from_secs(60));
    trip(&guard);

    let err = guard.execute(&healthy_batch(), true).unwrap_err();
    assert!(matches!(err, GuardError::CircuitOpen { .. }));
    assert!(!err.fallback_attempted());
    assert_eq!(guard.snapshot().total_rejections, 1);
}

#[test]
fn production_fails_fast_on_primary_failure() {
    let guard = guard(Environment::Production, Duration::from_secs(60));
    let err = guard.execute(&overflowing_batch(), true).unwrap_err();
    assert!(matches!(
        err,
        GuardError::Failed {
            reason: "fallback not permitted in production environment",
            ..
        }
    ));
}

#[test]
fn non_production_serves_from_scalar_engine_when_open() {
    let guard = guard(Environment::NonProduction, Duration::from_secs(60));
    trip(&guard);

    let (output, path) = guard.execute(&healthy_batch(), true).unwrap();
    assert_eq!(path, ComputationPath::Fallback);
    assert_eq!(output.results.len(), 1);
}

#[test]
fn non_production_fallback_answers_the_failing_batch() {
    let guard = guard(Environment::NonProduction, Duration::from_secs(60));
    let (output, path) = guard.execute(&overflowing_batch(), true).unwrap();
    assert_eq!(path, ComputationPath::Fallback);
    assert_eq!(output.stats.count, 1);
}

#[test]
fn caller_disabled_fallback_fails_fast_in_non_production() {
    let guard = guard(Environment::NonProduction, Duration::from_secs(60));
    trip(&guard);

    let err = guard.execute(&healthy_batch(), false).unwrap_err();
    assert!(matches!(
        err,
        GuardError::CircuitOpen {
            reason: "fallback disabled for production reliability",
            ..
        }
    ));
}

#[test]
fn successful_probe_closes_breaker_after_cooldown() {
    let guard = guard(Environment::Production, Duration::from_millis(20));
    trip(&guard);

    std::thread::sleep(Duration::from_millis(40));
    let (_, path) = guard.execute(&healthy_batch(), false).unwrap();
    assert_eq!(path, ComputationPath::Vectorized);
    assert_eq!(guard.snapshot().state, CircuitBreakerState::Closed);
    assert_eq!(guard.snapshot().consecutive_failures, 0);
}

#[test]
fn failed_probe_reopens_breaker() {
    let guard = guard(Environment::Production, Duration::from_millis(20));
    trip(&guard);

    std::thread::sleep(Duration::from_millis(40));
    let err = guard.execute(&overflowing_batch(), false).unwrap_err();
    assert!(matches!(err, GuardError::Failed { .. }));
    assert_eq!(guard.snapshot().state, CircuitBreakerState::Open);
}

#[test]
fn invalid_batch_never_counts_against_breaker() {
    let guard = guard(Environment::NonProduction, Duration::from_secs(60));
    let mut batch = OptionBatch::new(0.065, GreekName::ALL.to_vec());
    batch.push(descriptor(2500.0), 2510.0, 30.0 / 365.0, 7.5);

    for _ in 0..THRESHOLD * 2 {
        let err = guard.execute(&batch, true).unwrap_err();
        assert!(matches!(err, GuardError::InvalidInput { .. }));
    }
    assert_eq!(guard.snapshot().state, CircuitBreakerState::Closed);
}
