//! Scalar fallback engine.
//!
//! Prices one option and one Greek at a time through the model's public
//! functions. Slower than the vectorized path and used only when the fallback
//! policy allows it. Non-finite outputs become invalid markers instead of
//! failing the batch.

use std::time::Instant;

use super::batch::{BatchOutput, BatchStats, OptionBatch, bounded_greek, bounded_price};
use super::guard::BatchAttempt;
use super::EngineError;
use crate::models::{ComputationPath, GreekName, GreeksResult};
use crate::observability::record_batch;
use crate::pricing::PricingModel;

/// Per-option engine for the active pricing model.
#[derive(Debug, Clone, Copy)]
pub struct ScalarEngine {
    model: PricingModel,
}

impl ScalarEngine {
    /// Create an engine.
    #[must_use]
    pub const fn new(model: PricingModel) -> Self {
        Self { model }
    }

    /// Validate and compute a batch row by row.
    ///
    /// # Errors
    ///
    /// `InvalidBatch` when validation fails.
    pub fn compute(&self, batch: &OptionBatch) -> Result<BatchOutput, EngineError> {
        batch.validate()?;
        let started = Instant::now();

        let results: Vec<GreeksResult> = (0..batch.len())
            .map(|row| self.compute_row(batch, row))
            .collect();

        let elapsed = started.elapsed();
        record_batch(
            ComputationPath::Fallback.as_str(),
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

    fn compute_row(&self, batch: &OptionBatch, row: usize) -> GreeksResult {
        let inputs = batch.inputs(row);
        let ot = batch.descriptors[row].option_type;
        let (s, k, t, sigma, r) = (
            inputs.spot,
            inputs.strike,
            inputs.time_to_expiry,
            inputs.volatility,
            inputs.risk_free_rate,
        );
        let m = &self.model;

        let greeks = batch
            .greeks
            .iter()
            .map(|&name| {
                let raw = match name {
                    GreekName::Delta => m.delta(s, k, t, sigma, r, ot),
                    GreekName::Gamma => m.gamma(s, k, t, sigma, r),
                    GreekName::Theta => m.theta(s, k, t, sigma, r, ot),
                    GreekName::Vega => m.vega(s, k, t, sigma, r),
                    GreekName::Rho => m.rho(s, k, t, sigma, r, ot),
                };
                (name, bounded_greek(name, raw))
            })
            .collect();

        GreeksResult {
            price: bounded_price(m.price(s, k, t, sigma, r, ot)),
            greeks,
            inputs,
        }
    }
}

impl BatchAttempt<OptionBatch> for ScalarEngine {
    type Output = BatchOutput;

    fn name(&self) -> &'static str {
        ComputationPath::Fallback.as_str()
    }

    fn attempt(&self, input: &OptionBatch) -> Result<BatchOutput, EngineError> {
        self.compute(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VectorizedEngine;
    use crate::engine::batch::fixtures::batch;
    use crate::models::GreekValue;
    use crate::pricing::ModelKind;

    #[test]
    fn test_agrees_with_vectorized() {
        let model = PricingModel::new(ModelKind::BlackScholes);
        let b = batch(10);
        let scalar = ScalarEngine::new(model).compute(&b).unwrap();
        let vectorized = VectorizedEngine::new(model, 256).compute(&b).unwrap();

        for (s, v) in scalar.results.iter().zip(&vectorized.results) {
            for name in GreekName::ALL {
                let (a, b) = (s.get(name).unwrap(), v.get(name).unwrap());
                match (a, b) {
                    (GreekValue::Value(a), GreekValue::Value(b)) => assert!((a - b).abs() < 1e-12),
                    _ => assert_eq!(a, b),
                }
            }
        }
    }

    #[test]
    fn test_validates_batch() {
        let mut b = batch(2);
        b.strikes[0] = -1.0;
        let err = ScalarEngine::new(PricingModel::new(ModelKind::Black76))
            .compute(&b)
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_survives_overflowing_terms() {
        // d1 overflows here, which fails the vectorized engine
        let mut b = batch(1);
        b.spots[0] = f64::MAX;
        b.strikes[0] = f64::MIN_POSITIVE;
        b.vols[0] = 1e-300;
        b.times[0] = 1e-300;
        let output = ScalarEngine::new(PricingModel::new(ModelKind::BlackScholes))
            .compute(&b)
            .unwrap();
        assert_eq!(output.results[0].get(GreekName::Delta), Some(GreekValue::Value(1.0)));
    }
}
