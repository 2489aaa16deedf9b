// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Fixed-Point Amounts
//!
//! Every quantity in ETHX (native currency, credits, and the exchange rate
//! itself) is a [`Wad`]: an unsigned integer count of base units with 18
//! implied decimal places. One whole unit is `10^18` base units, the same
//! scale `parseEther` uses.
//!
//! Floating point never touches money here. Multiplication and division
//! between two wads widen to 256 bits before rescaling, so `amount * rate`
//! cannot overflow mid-computation even when both operands are large.
//! Results truncate toward zero.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::CREDIT_DECIMALS;

/// Base units per whole unit (`10^18`).
pub const WAD: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by fixed-point parsing and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input string was empty.
    #[error("empty amount")]
    Empty,

    /// The input contained something other than ASCII digits and one dot.
    #[error("invalid amount: {0:?}")]
    Invalid(String),

    /// More fractional digits than the 18-decimal scale can represent.
    #[error("too many decimal places: at most {max} allowed")]
    TooManyDecimals {
        /// The maximum number of fractional digits.
        max: u32,
    },

    /// The result does not fit in 128 bits of base units.
    #[error("amount overflow")]
    Overflow,

    /// Division by a zero amount.
    #[error("division by zero")]
    DivisionByZero,
}

// ---------------------------------------------------------------------------
// Wad
// ---------------------------------------------------------------------------

/// An unsigned 18-decimal fixed-point quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wad(u128);

impl Wad {
    /// Zero.
    pub const ZERO: Wad = Wad(0);

    /// Exactly one whole unit.
    pub const ONE: Wad = Wad(WAD);

    /// Wraps a raw base-unit count.
    pub const fn from_base_units(units: u128) -> Self {
        Wad(units)
    }

    /// The raw base-unit count.
    pub const fn base_units(self) -> u128 {
        self.0
    }

    /// Builds an amount from a whole-unit count (`units * 10^18`).
    pub fn from_whole(units: u128) -> Result<Self, AmountError> {
        units
            .checked_mul(WAD)
            .map(Wad)
            .ok_or(AmountError::Overflow)
    }

    /// Parses a human decimal string such as `"1000"`, `"0.5"` or `".25"`.
    ///
    /// At most 18 fractional digits are accepted. Signs, exponents, and
    /// separators are rejected.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Invalid(input.to_string()));
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::Invalid(input.to_string()));
        }
        if frac.len() > CREDIT_DECIMALS as usize {
            return Err(AmountError::TooManyDecimals {
                max: CREDIT_DECIMALS,
            });
        }

        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };

        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let digits: u128 = frac
                .parse()
                .map_err(|_| AmountError::Invalid(input.to_string()))?;
            digits * 10u128.pow(CREDIT_DECIMALS - frac.len() as u32)
        };

        Self::from_whole(whole_units)?
            .checked_add(Wad(frac_units))
            .ok_or(AmountError::Overflow)
    }

    /// Returns `true` for the zero amount.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition. `None` on overflow.
    pub fn checked_add(self, rhs: Wad) -> Option<Wad> {
        self.0.checked_add(rhs.0).map(Wad)
    }

    /// Checked subtraction. `None` when `rhs > self`.
    pub fn checked_sub(self, rhs: Wad) -> Option<Wad> {
        self.0.checked_sub(rhs.0).map(Wad)
    }

    /// Fixed-point product: `floor(self * rhs / 10^18)`.
    pub fn mul_wad(self, rhs: Wad) -> Result<Wad, AmountError> {
        let product = U256::from(self.0) * U256::from(rhs.0);
        narrow(product / U256::from(WAD))
    }

    /// Fixed-point quotient: `floor(self * 10^18 / rhs)`.
    pub fn div_wad(self, rhs: Wad) -> Result<Wad, AmountError> {
        if rhs.is_zero() {
            return Err(AmountError::DivisionByZero);
        }
        let scaled = U256::from(self.0) * U256::from(WAD);
        narrow(scaled / U256::from(rhs.0))
    }

    /// Approximate value in whole units, for gauges and display only.
    pub fn to_f64_lossy(self) -> f64 {
        self.0 as f64 / WAD as f64
    }
}

/// Narrows a 256-bit intermediate back into a `Wad`.
fn narrow(value: U256) -> Result<Wad, AmountError> {
    if value.bits() > 128 {
        return Err(AmountError::Overflow);
    }
    Ok(Wad(value.low_u128()))
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / WAD;
        let frac = self.0 % WAD;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:018}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Wad {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Wad::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

// On the wire a wad is its base-unit integer as a decimal string, so JSON
// consumers never lose precision above 2^53.
impl Serialize for Wad {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

struct WadVisitor;

impl<'de> Visitor<'de> for WadVisitor {
    type Value = Wad;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a base-unit integer rendered as a string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Wad, E> {
        v.parse::<u128>()
            .map(Wad)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for Wad {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(WadVisitor)
    }
}
