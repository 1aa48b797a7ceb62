//! Vectorized Greeks engine.
//!
//! Evaluates the shared model terms once per row and derives the price and
//! every requested Greek from them. Rows are independent, so batches at or
//! above the parallel threshold are split across the rayon pool; results keep
//! input order either way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use super::batch::{BatchOutput, BatchStats, OptionBatch, result_from_terms};
use super::guard::BatchAttempt;
use super::EngineError;
use crate::models::{ComputationPath, GreeksResult};
use crate::observability::record_batch;
use crate::pricing::PricingModel;

/// Cumulative engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Batches computed successfully.
    pub batches: u64,
    /// Options computed successfully.
    pub options: u64,
    /// Batches that failed.
    pub failures: u64,
    /// Wall time of successful batches.
    pub total_latency: Duration,
}

impl EngineStats {
    /// Mean wall time per successful batch.
    #[must_use]
    pub fn avg_latency(&self) -> Duration {
        if self.batches == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.batches);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Batch engine for the active pricing model.
#[derive(Debug)]
pub struct VectorizedEngine {
    model: PricingModel,
    parallel_threshold: usize,
    batches: AtomicU64,
    options: AtomicU64,
    failures: AtomicU64,
    latency_nanos: AtomicU64,
}

impl VectorizedEngine {
    /// Create an engine.
    ///
    /// Batches with at least `parallel_threshold` rows run on the rayon pool.
    #[must_use]
    pub const fn new(model: PricingModel, parallel_threshold: usize) -> Self {
        Self {
            model,
            parallel_threshold,
            batches: AtomicU64::new(0),
            options: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            latency_nanos: AtomicU64::new(0),
        }
    }

    /// Active model.
    #[must_use]
    pub const fn model(&self) -> PricingModel {
        self.model
    }

    /// Validate and compute a batch.
    ///
    /// # Errors
    ///
    /// `InvalidBatch` when validation fails, `Numerical` when any row yields
    /// non-finite model terms. Either way no partial output is returned.
    pub fn compute(&self, batch: &OptionBatch) -> Result<BatchOutput, EngineError> {
        let started = Instant::now();
        let outcome = batch.validate().and_then(|()| self.evaluate(batch));

        match outcome {
            Ok(results) => {
                let elapsed = started.elapsed();
                self.batches.fetch_add(1, Ordering::Relaxed);
                self.options.fetch_add(results.len() as u64, Ordering::Relaxed);
                self.latency_nanos.fetch_add(
                    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
                    Ordering::Relaxed,
                );
                record_batch(
                    ComputationPath::Vectorized.as_str(),
                    results.len(),
                    elapsed.as_secs_f64(),
                );
                Ok(BatchOutput {
                    stats: BatchStats {
                        count: results.len(),
                        elapsed,
                    },
                    results,
                })
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn evaluate(&self, batch: &OptionBatch) -> Result<Vec<GreeksResult>, EngineError> {
        if batch.len() >= self.parallel_threshold {
            (0..batch.len())
                .into_par_iter()
                .map(|row| self.evaluate_row(batch, row))
                .collect()
        } else {
            (0..batch.len())
                .map(|row| self.evaluate_row(batch, row))
                .collect()
        }
    }

    fn evaluate_row(&self, batch: &OptionBatch, row: usize) -> Result<GreeksResult, EngineError> {
        let terms = self.model.terms(
            batch.spots[row],
            batch.strikes[row],
            batch.times[row],
            batch.vols[row],
            batch.rate,
        );
        if !terms.is_finite() {
            return Err(EngineError::Numerical {
                row,
                reason: format!("non-finite d1/d2 (d1={}, d2={})", terms.d1, terms.d2),
            });
        }
        Ok(result_from_terms(&terms, batch, row))
    }

    /// Cumulative counters since construction.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            batches: self.batches.load(Ordering::Relaxed),
            options: self.options.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total_latency: Duration::from_nanos(self.latency_nanos.load(Ordering::Relaxed)),
        }
    }
}

impl BatchAttempt<OptionBatch> for VectorizedEngine {
    type Output = BatchOutput;

    fn name(&self) -> &'static str {
        ComputationPath::Vectorized.as_str()
    }

    fn attempt(&self, input: &OptionBatch) -> Result<BatchOutput, EngineError> {
        self.compute(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::batch::fixtures::{batch, descriptor};
    use crate::models::{GreekName, GreekValue, OptionType};
    use crate::pricing::ModelKind;
    use proptest::prelude::*;

    fn engine(parallel_threshold: usize) -> VectorizedEngine {
        VectorizedEngine::new(PricingModel::new(ModelKind::BlackScholes), parallel_threshold)
    }

    #[test]
    fn test_output_length_and_order() {
        let b = batch(12);
        let output = engine(256).compute(&b).unwrap();
        assert_eq!(output.results.len(), 12);
        assert_eq!(output.stats.count, 12);
        for (i, result) in output.results.iter().enumerate() {
            assert!((result.inputs.strike - b.strikes[i]).abs() < f64::EPSILON);
            assert!((result.inputs.time_to_expiry - b.times[i]).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_matches_model_reference() {
        let mut b = OptionBatch::new(0.05, GreekName::ALL.to_vec());
        b.push(descriptor(100.0, OptionType::Call), 100.0, 1.0, 0.2);
        let output = engine(256).compute(&b).unwrap();
        let result = &output.results[0];

        assert!((result.price.value().unwrap() - 10.4506).abs() < 1e-3);
        assert!((result.get(GreekName::Delta).unwrap().value().unwrap() - 0.6368).abs() < 1e-3);
        // Vega per vol point, theta per day
        assert!((result.get(GreekName::Vega).unwrap().value().unwrap() - 0.37524).abs() < 1e-4);
        assert!((result.get(GreekName::Theta).unwrap().value().unwrap() + 6.414 / 365.0).abs() < 1e-4);
    }

    #[test]
    fn test_requested_greeks_only() {
        let mut b = batch(2);
        b.greeks = vec![GreekName::Delta, GreekName::Gamma];
        let output = engine(256).compute(&b).unwrap();
        assert_eq!(output.results[0].greeks.len(), 2);
        assert!(output.results[0].get(GreekName::Rho).is_none());
    }

    #[test]
    fn test_invalid_batch_rejected_whole() {
        let mut b = batch(4);
        b.vols[3] = 6.0;
        let engine = engine(256);
        let err = engine.compute(&b).unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(engine.stats().failures, 1);
        assert_eq!(engine.stats().options, 0);
    }

    #[test]
    fn test_numerical_failure() {
        let mut b = batch(2);
        // Passes validation, overflows ln(S/K)/(sigma*sqrt(t))
        b.spots[1] = f64::MAX;
        b.strikes[1] = f64::MIN_POSITIVE;
        b.vols[1] = 1e-300;
        b.times[1] = 1e-300;
        let err = engine(256).compute(&b).unwrap_err();
        assert!(matches!(err, EngineError::Numerical { row: 1, .. }));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let b = batch(300);
        let sequential = engine(usize::MAX).compute(&b).unwrap();
        let parallel = engine(1).compute(&b).unwrap();
        assert_eq!(sequential.results, parallel.results);
    }

    #[test]
    fn test_idempotent() {
        let b = batch(20);
        let engine = engine(256);
        let first = engine.compute(&b).unwrap();
        let second = engine.compute(&b).unwrap();
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn test_stats_accumulate() {
        let engine = engine(256);
        engine.compute(&batch(3)).unwrap();
        engine.compute(&batch(5)).unwrap();
        let stats = engine.stats();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.options, 8);
        assert!(stats.avg_latency() <= stats.total_latency);
    }

    #[test]
    fn test_empty_batch() {
        let output = engine(256).compute(&batch(0)).unwrap();
        assert!(output.results.is_empty());
    }

    proptest! {
        #[test]
        fn prop_clamp_invariant(
            spot in 1.0f64..10_000.0,
            strike in 1.0f64..10_000.0,
            t in 0.001f64..10.0,
            sigma in 0.001f64..5.0,
            rate in 0.0f64..0.2,
            is_call in any::<bool>(),
        ) {
            let option_type = if is_call { OptionType::Call } else { OptionType::Put };
            let mut b = OptionBatch::new(rate, GreekName::ALL.to_vec());
            b.push(descriptor(strike, option_type), spot, t, sigma);
            let output = engine(256).compute(&b).unwrap();
            let result = &output.results[0];

            if let Some(GreekValue::Value(delta)) = result.get(GreekName::Delta) {
                prop_assert!((-1.0..=1.0).contains(&delta));
            }
            if let Some(GreekValue::Value(gamma)) = result.get(GreekName::Gamma) {
                prop_assert!(gamma >= 0.0);
            }
            if let Some(GreekValue::Value(vega)) = result.get(GreekName::Vega) {
                prop_assert!(vega >= 0.0);
            }
        }
    }
}
