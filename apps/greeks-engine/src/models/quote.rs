//! Inbound market data: option ticks, underlying quotes and volatility quotes.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// One inbound option tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Instrument key, e.g. `NSE@RELIANCE@OPT@25DEC25@CE@2500`.
    pub instrument: String,
    /// Observed option price.
    pub price: Decimal,
    /// Observation time.
    pub timestamp: DateTime<Utc>,
    /// Quote currency.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Exchange timezone name, carried through to the envelope.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl TickSnapshot {
    /// Create a tick with the default currency and timezone.
    #[must_use]
    pub fn new(instrument: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            price,
            timestamp,
            currency: default_currency(),
            timezone: default_timezone(),
        }
    }
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

/// Latest known price of an underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingQuote {
    /// Underlying key (`exchange@symbol@type`).
    pub symbol: String,
    /// Last price.
    pub price: Decimal,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
}

impl UnderlyingQuote {
    /// Create a new quote.
    #[must_use]
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }

    /// Absolute distance between this quote and `at`, in milliseconds.
    ///
    /// Absolute because underlying quotes may arrive after the option tick
    /// they belong to.
    #[must_use]
    pub fn age_ms(&self, at: DateTime<Utc>) -> i64 {
        (at - self.timestamp).num_milliseconds().abs()
    }

    /// True when this quote is at most `window_ms` from `at`, either side.
    ///
    /// Compares the exact distance, so 2000.9ms is outside a 2000ms window.
    #[must_use]
    pub fn is_within_ms(&self, at: DateTime<Utc>, window_ms: u64) -> bool {
        let window = i64::try_from(window_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds);
        within(self.timestamp, at, window)
    }

    /// Price as `f64`, if representable and positive.
    #[must_use]
    pub fn price_f64(&self) -> Option<f64> {
        self.price.to_f64().filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// Where a volatility figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilitySource {
    /// Index-wide volatility (e.g. India VIX).
    Index,
    /// Implied from the option's own price.
    Implied,
}

impl std::fmt::Display for VolatilitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Implied => write!(f, "implied"),
        }
    }
}

/// A volatility figure, always stored as a decimal fraction once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityQuote {
    /// Volatility value.
    pub value: f64,
    /// Source of the figure.
    pub source: VolatilitySource,
    /// Time the figure was observed or derived.
    pub timestamp: DateTime<Utc>,
}

impl VolatilityQuote {
    /// Index volatility quote, normalizing percentage-style values.
    #[must_use]
    pub fn index(raw: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: normalize_volatility(raw),
            source: VolatilitySource::Index,
            timestamp,
        }
    }

    /// Implied volatility quote.
    #[must_use]
    pub const fn implied(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            source: VolatilitySource::Implied,
            timestamp,
        }
    }

    /// Returns this quote with its value normalized to a decimal fraction.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            value: normalize_volatility(self.value),
            ..self
        }
    }

    /// True when this quote is at most `max_age_secs` from `at`, either side.
    #[must_use]
    pub fn is_within_secs(&self, at: DateTime<Utc>, max_age_secs: u64) -> bool {
        let window = i64::try_from(max_age_secs)
            .ok()
            .and_then(TimeDelta::try_seconds);
        within(self.timestamp, at, window)
    }

    /// True when the value can be used in a calculation.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

/// `None` is a window too wide to represent, which admits everything.
fn within(timestamp: DateTime<Utc>, at: DateTime<Utc>, window: Option<TimeDelta>) -> bool {
    let distance = (at - timestamp).abs();
    window.is_none_or(|window| distance <= window)
}

/// Convert a percentage-style volatility (e.g. 18.5) into a decimal (0.185).
///
/// Values at or below 1.0 are already decimals and pass through unchanged.
#[must_use]
pub fn normalize_volatility(raw: f64) -> f64 {
    if raw > 1.0 { raw / 100.0 } else { raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_percentage_volatility() {
        assert!((normalize_volatility(18.5) - 0.185).abs() < 1e-12);
        assert!((normalize_volatility(0.185) - 0.185).abs() < f64::EPSILON);
        assert!((normalize_volatility(1.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_index_quote_normalizes() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 1, 4, 0, 0).unwrap();
        let quote = VolatilityQuote::index(18.5, ts);
        assert!((quote.value - 0.185).abs() < 1e-12);
        assert_eq!(quote.source, VolatilitySource::Index);
        assert!(quote.is_usable());
    }

    #[test]
    fn test_age_is_symmetric() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 1, 4, 0, 0).unwrap();
        let quote = UnderlyingQuote::new("NSE@RELIANCE@OPT", dec!(2510.5), ts);
        let later = ts + chrono::Duration::milliseconds(1500);
        let earlier = ts - chrono::Duration::milliseconds(1500);
        assert_eq!(quote.age_ms(later), 1500);
        assert_eq!(quote.age_ms(earlier), 1500);
    }

    #[test]
    fn test_window_compares_sub_millisecond_distance() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 1, 4, 0, 0).unwrap();
        let quote = UnderlyingQuote::new("NSE@RELIANCE@OPT", dec!(2510.5), ts);

        assert!(quote.is_within_ms(ts + TimeDelta::milliseconds(2000), 2000));
        assert!(quote.is_within_ms(ts - TimeDelta::milliseconds(2000), 2000));
        assert!(!quote.is_within_ms(ts + TimeDelta::microseconds(2_000_900), 2000));
        assert!(!quote.is_within_ms(ts - TimeDelta::microseconds(2_000_001), 2000));
        assert!(quote.is_within_ms(ts + TimeDelta::days(365), u64::MAX));
    }

    #[test]
    fn test_volatility_window_compares_sub_second_distance() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 1, 4, 0, 0).unwrap();
        let quote = VolatilityQuote::index(18.5, ts);

        assert!(quote.is_within_secs(ts + TimeDelta::seconds(300), 300));
        assert!(!quote.is_within_secs(ts + TimeDelta::milliseconds(300_500), 300));
    }

    #[test]
    fn test_tick_defaults_on_deserialize() {
        let json = r#"{"instrument":"NSE@RELIANCE@OPT@25DEC25@CE@2500","price":"42.5","timestamp":"2025-12-01T04:00:00Z"}"#;
        let tick: TickSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(tick.price, dec!(42.5));
        assert_eq!(tick.currency, "INR");
        assert_eq!(tick.timezone, "Asia/Kolkata");
    }
}
