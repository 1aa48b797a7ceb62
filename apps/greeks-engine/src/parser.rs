//! Option instrument key parser.
//!
//! Keys are `@`-joined with a fixed field count:
//!
//! ```text
//! NSE@RELIANCE@OPT@25DEC25@CE@2500
//! │   │        │   │       │  └ strike
//! │   │        │   │       └ option type (CE/PE)
//! │   │        │   └ expiry code (DDMMMYY)
//! │   │        └ instrument type
//! │   └ symbol
//! └ exchange
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{OptionDescriptor, OptionType};

/// Field separator in instrument keys.
pub const KEY_DELIMITER: char = '@';

/// Number of fields in an option key.
pub const KEY_FIELD_COUNT: usize = 6;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Errors from instrument key parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Wrong number of delimited fields.
    #[error("expected {expected} '@'-separated fields in '{input}', found {found}")]
    FieldCount {
        /// Key that failed.
        input: String,
        /// Expected count.
        expected: usize,
        /// Actual count.
        found: usize,
    },

    /// A field was empty.
    #[error("field {index} of '{input}' is empty")]
    EmptyField {
        /// Key that failed.
        input: String,
        /// Zero-based field index.
        index: usize,
    },

    /// Expiry code does not map to a calendar date.
    #[error("invalid expiry code '{code}': {reason}")]
    InvalidExpiry {
        /// Offending code.
        code: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Option type was not CE or PE.
    #[error("invalid option type '{code}'")]
    InvalidOptionType {
        /// Offending code.
        code: String,
    },

    /// Strike was non-numeric or not strictly positive.
    #[error("invalid strike '{code}': must be a positive number")]
    InvalidStrike {
        /// Offending code.
        code: String,
    },
}

/// Parse an option instrument key into its descriptor.
///
/// # Errors
///
/// Returns `ParseError` on a wrong field count, an empty field, an expiry code
/// that is not a real date, an unknown option type or a non-positive strike.
pub fn parse_option_key(key: &str) -> Result<OptionDescriptor, ParseError> {
    let fields: Vec<&str> = key.trim().split(KEY_DELIMITER).collect();
    if fields.len() != KEY_FIELD_COUNT {
        return Err(ParseError::FieldCount {
            input: key.to_string(),
            expected: KEY_FIELD_COUNT,
            found: fields.len(),
        });
    }
    if let Some(index) = fields.iter().position(|f| f.trim().is_empty()) {
        return Err(ParseError::EmptyField {
            input: key.to_string(),
            index,
        });
    }

    let option_type = fields[4]
        .parse::<OptionType>()
        .map_err(|_| ParseError::InvalidOptionType {
            code: fields[4].to_string(),
        })?;

    Ok(OptionDescriptor {
        exchange: fields[0].to_string(),
        symbol: fields[1].to_string(),
        instrument_type: fields[2].to_string(),
        expiry: parse_expiry_code(fields[3])?,
        option_type,
        strike: parse_strike(fields[5])?,
    })
}

/// Parse a `DDMMMYY` expiry code (e.g. `25DEC25`) into a date in 2000-2099.
///
/// # Errors
///
/// Returns `ParseError::InvalidExpiry` when the code is malformed or names a
/// day that does not exist in that month.
pub fn parse_expiry_code(code: &str) -> Result<NaiveDate, ParseError> {
    let invalid = |reason: &str| ParseError::InvalidExpiry {
        code: code.to_string(),
        reason: reason.to_string(),
    };

    let code_upper = code.trim().to_ascii_uppercase();
    if code_upper.len() != 7 || !code_upper.is_ascii() {
        return Err(invalid("expected DDMMMYY"));
    }

    let (day, rest) = code_upper.split_at(2);
    let (month, year) = rest.split_at(3);

    let day: u32 = parse_digits(day).ok_or_else(|| invalid("day must be two digits"))?;
    let year: i32 = parse_digits(year).ok_or_else(|| invalid("year must be two digits"))?;
    let month = MONTHS
        .iter()
        .position(|m| *m == month)
        .ok_or_else(|| invalid("unknown month abbreviation"))?;

    NaiveDate::from_ymd_opt(2000 + year, month as u32 + 1, day)
        .ok_or_else(|| invalid("no such calendar date"))
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn parse_strike(code: &str) -> Result<f64, ParseError> {
    match code.trim().parse::<f64>() {
        Ok(strike) if strike.is_finite() && strike > 0.0 => Ok(strike),
        _ => Err(ParseError::InvalidStrike {
            code: code.to_string(),
        }),
    }
}
