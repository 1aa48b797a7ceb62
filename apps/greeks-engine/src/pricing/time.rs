//! Time-to-expiry in years.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Annualization divisor (calendar days per year).
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Milliseconds per day.
const MS_PER_DAY: f64 = 86_400_000.0;

/// Floor applied to time-to-expiry: one minute, in years.
pub const MIN_TIME_TO_EXPIRY: f64 = 1.0 / (DAYS_PER_YEAR * 24.0 * 60.0);

/// Default expiry cutoff, 10:00 UTC (15:30 IST market close).
pub const DEFAULT_EXPIRY_CUTOFF: NaiveTime = match NaiveTime::from_hms_opt(10, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

/// Years between `now` and the contract's expiry instant.
///
/// The expiry instant is `expiry` at `cutoff` UTC. The result is floored to
/// [`MIN_TIME_TO_EXPIRY`], so it is strictly positive even at or after expiry.
#[must_use]
pub fn time_to_expiry(expiry: NaiveDate, now: DateTime<Utc>, cutoff: NaiveTime) -> f64 {
    let expires_at = expiry.and_time(cutoff).and_utc();
    let days = (expires_at - now).num_milliseconds() as f64 / MS_PER_DAY;
    (days / DAYS_PER_YEAR).max(MIN_TIME_TO_EXPIRY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()
    }

    #[test]
    fn test_thirty_days_out() {
        let now = Utc.with_ymd_and_hms(2025, 11, 25, 10, 0, 0).unwrap();
        let t = time_to_expiry(expiry(), now, DEFAULT_EXPIRY_CUTOFF);
        assert!((t - 30.0 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn test_intraday_on_expiry_day() {
        let now = Utc.with_ymd_and_hms(2025, 12, 25, 4, 0, 0).unwrap();
        let t = time_to_expiry(expiry(), now, DEFAULT_EXPIRY_CUTOFF);
        assert!((t - 0.25 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn test_expired_is_floored() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let t = time_to_expiry(expiry(), now, DEFAULT_EXPIRY_CUTOFF);
        assert!((t - MIN_TIME_TO_EXPIRY).abs() < f64::EPSILON);
        assert!(t > 0.0);
    }

    #[test]
    fn test_exactly_at_expiry_is_floored() {
        let now = Utc.with_ymd_and_hms(2025, 12, 25, 10, 0, 0).unwrap();
        assert!(time_to_expiry(expiry(), now, DEFAULT_EXPIRY_CUTOFF) > 0.0);
    }
}
