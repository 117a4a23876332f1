//! Node cost tags.
//!
//! Costs are stored as exact decimals with nine fractional digits so that
//! tags such as "0.10" and "0.05" compare without floating point error.
//! Digits past the ninth are truncated.

use crate::error::{CoreError, Result};
use std::fmt;
use std::str::FromStr;

const FRACTION_DIGITS: usize = 9;
const NANOS_PER_UNIT: u64 = 1_000_000_000;

/// A non-negative decimal cost parsed from a node annotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost {
    nanos: u64,
}

impl Cost {
    /// Cost assumed for a node that carries no cost tag
    pub const ZERO: Cost = Cost { nanos: 0 };

    /// Build a cost from billionths of a unit
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }
}

impl FromStr for Cost {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(CoreError::invalid_cost(s, "no digits"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(CoreError::invalid_cost(
                s,
                "expected a non-negative decimal number",
            ));
        }
        let fraction = &fraction[..fraction.len().min(FRACTION_DIGITS)];

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| CoreError::invalid_cost(s, "value out of range"))?
        };

        let fraction_nanos: u64 = if fraction.is_empty() {
            0
        } else {
            // At most nine digits, always fits
            let digits: u64 = fraction
                .parse()
                .map_err(|_| CoreError::invalid_cost(s, "value out of range"))?;
            digits * 10u64.pow((FRACTION_DIGITS - fraction.len()) as u32)
        };

        let nanos = whole
            .checked_mul(NANOS_PER_UNIT)
            .and_then(|w| w.checked_add(fraction_nanos))
            .ok_or_else(|| CoreError::invalid_cost(s, "value out of range"))?;

        Ok(Self { nanos })
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.nanos / NANOS_PER_UNIT;
        let fraction = self.nanos % NANOS_PER_UNIT;
        if fraction == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:09}", fraction);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}
