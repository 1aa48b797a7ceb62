//! Column-oriented option batches and output bounds.

use std::time::Duration;

use crate::models::{GreekName, GreekValue, GreeksInputs, GreeksResult, OptionDescriptor};
use crate::pricing::{ModelTerms, reported};

use super::EngineError;

/// Longest time-to-expiry accepted, in years.
pub const MAX_TIME_TO_EXPIRY: f64 = 10.0;

/// Highest volatility accepted, as a decimal.
pub const MAX_VOLATILITY: f64 = 5.0;

/// Options priced together, stored column-wise.
///
/// Row `i` of every column describes option `i`; strikes and option types come
/// from the descriptors, the remaining inputs from the columns.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionBatch {
    /// Parsed contracts.
    pub descriptors: Vec<OptionDescriptor>,
    /// Underlying prices.
    pub spots: Vec<f64>,
    /// Strikes.
    pub strikes: Vec<f64>,
    /// Times to expiry, in years.
    pub times: Vec<f64>,
    /// Volatilities, as decimals.
    pub vols: Vec<f64>,
    /// Risk-free rate shared by the batch.
    pub rate: f64,
    /// Greeks to compute for every row.
    pub greeks: Vec<GreekName>,
}

impl OptionBatch {
    /// Empty batch.
    #[must_use]
    pub fn new(rate: f64, greeks: Vec<GreekName>) -> Self {
        Self {
            descriptors: Vec::new(),
            spots: Vec::new(),
            strikes: Vec::new(),
            times: Vec::new(),
            vols: Vec::new(),
            rate,
            greeks,
        }
    }

    /// Append one option.
    pub fn push(&mut self, descriptor: OptionDescriptor, spot: f64, time: f64, vol: f64) {
        self.strikes.push(descriptor.strike);
        self.descriptors.push(descriptor);
        self.spots.push(spot);
        self.times.push(time);
        self.vols.push(vol);
    }

    /// Number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True when there are no options.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Inputs of row `i`.
    #[must_use]
    pub fn inputs(&self, i: usize) -> GreeksInputs {
        GreeksInputs {
            spot: self.spots[i],
            strike: self.strikes[i],
            time_to_expiry: self.times[i],
            volatility: self.vols[i],
            risk_free_rate: self.rate,
        }
    }

    /// Check shapes and per-row domain bounds.
    ///
    /// Any violation rejects the whole batch.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidBatch` naming the first violation.
    pub fn validate(&self) -> Result<(), EngineError> {
        let n = self.descriptors.len();
        let lengths = [
            ("spots", self.spots.len()),
            ("strikes", self.strikes.len()),
            ("times", self.times.len()),
            ("vols", self.vols.len()),
        ];
        if let Some((column, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(invalid(format!(
                "column '{column}' has {len} rows, expected {n}"
            )));
        }
        if !self.rate.is_finite() {
            return Err(invalid(format!("risk-free rate {} is not finite", self.rate)));
        }

        for i in 0..n {
            let GreeksInputs {
                spot,
                strike,
                time_to_expiry: t,
                volatility: sigma,
                ..
            } = self.inputs(i);

            if !spot.is_finite() || spot <= 0.0 {
                return Err(invalid(format!("row {i}: spot {spot} must be positive")));
            }
            if !strike.is_finite() || strike <= 0.0 {
                return Err(invalid(format!("row {i}: strike {strike} must be positive")));
            }
            if !t.is_finite() || t <= 0.0 || t > MAX_TIME_TO_EXPIRY {
                return Err(invalid(format!(
                    "row {i}: time to expiry {t} outside (0, {MAX_TIME_TO_EXPIRY}]"
                )));
            }
            if !sigma.is_finite() || sigma <= 0.0 || sigma > MAX_VOLATILITY {
                return Err(invalid(format!(
                    "row {i}: volatility {sigma} outside (0, {MAX_VOLATILITY}]"
                )));
            }
        }
        Ok(())
    }
}

fn invalid(reason: String) -> EngineError {
    EngineError::InvalidBatch { reason }
}

/// Per-batch performance metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    /// Options computed.
    pub count: usize,
    /// Wall time.
    pub elapsed: Duration,
}

/// Engine output: one result per input row, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutput {
    /// Per-option results.
    pub results: Vec<GreeksResult>,
    /// Performance metadata.
    pub stats: BatchStats,
}

/// Apply the reporting unit and domain bounds to a raw Greek.
///
/// Delta is clamped to `[-1, 1]`, gamma and vega to `[0, inf)`. Theta and rho
/// only need to be finite. Anything non-finite becomes the invalid marker.
#[must_use]
pub fn bounded_greek(name: GreekName, raw: f64) -> GreekValue {
    let value = reported(name, raw);
    match name {
        GreekName::Delta => GreekValue::clamped(value, -1.0, 1.0),
        GreekName::Gamma | GreekName::Vega => GreekValue::clamped(value, 0.0, f64::INFINITY),
        GreekName::Theta | GreekName::Rho => GreekValue::finite(value),
    }
}

/// Model price floored at zero.
#[must_use]
pub fn bounded_price(raw: f64) -> GreekValue {
    GreekValue::clamped(raw, 0.0, f64::INFINITY)
}

/// Assemble a result from precomputed terms.
pub(crate) fn result_from_terms(
    terms: &ModelTerms,
    batch: &OptionBatch,
    row: usize,
) -> GreeksResult {
    let option_type = batch.descriptors[row].option_type;
    GreeksResult {
        price: bounded_price(terms.price(option_type)),
        greeks: batch
            .greeks
            .iter()
            .map(|&name| (name, bounded_greek(name, terms.greek(name, option_type))))
            .collect(),
        inputs: batch.inputs(row),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::batch;
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_valid_batch() {
        assert!(batch(5).validate().is_ok());
        assert!(batch(0).validate().is_ok());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut b = batch(3);
        b.vols.pop();
        let err = b.validate().unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("vols"));
    }

    #[test_case(|b: &mut OptionBatch| b.strikes[1] = 0.0, "strike" ; "zero strike")]
    #[test_case(|b: &mut OptionBatch| b.times[1] = 0.0, "time" ; "zero time")]
    #[test_case(|b: &mut OptionBatch| b.times[1] = 10.5, "time" ; "time beyond ten years")]
    #[test_case(|b: &mut OptionBatch| b.vols[1] = 0.0, "volatility" ; "zero vol")]
    #[test_case(|b: &mut OptionBatch| b.vols[1] = 5.01, "volatility" ; "vol above cap")]
    #[test_case(|b: &mut OptionBatch| b.spots[1] = f64::NAN, "spot" ; "nan spot")]
    fn test_domain_violation_rejects_batch(mutate: fn(&mut OptionBatch), field: &str) {
        let mut b = batch(3);
        mutate(&mut b);
        let err = b.validate().unwrap_err();
        assert!(err.to_string().contains("row 1"));
        assert!(err.to_string().contains(field));
    }

    #[test]
    fn test_bounds_at_limits_accepted() {
        let mut b = batch(1);
        b.times[0] = MAX_TIME_TO_EXPIRY;
        b.vols[0] = MAX_VOLATILITY;
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_bounded_greek() {
        assert_eq!(bounded_greek(GreekName::Delta, 1.2), GreekValue::Value(1.0));
        assert_eq!(bounded_greek(GreekName::Gamma, -1e-18), GreekValue::Value(0.0));
        assert_eq!(bounded_greek(GreekName::Vega, f64::NAN), GreekValue::Invalid);
        assert_eq!(bounded_greek(GreekName::Theta, -365.0), GreekValue::Value(-1.0));
        assert_eq!(bounded_greek(GreekName::Rho, f64::INFINITY), GreekValue::Invalid);
        assert_eq!(bounded_price(-0.0001), GreekValue::Value(0.0));
    }
}
