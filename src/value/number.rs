//! Arbitrary-precision decimal numbers (§3 "Number semantics", §9 "Numbers").
//!
//! `f64` loses precision and breaks the equality/hash invariant the moment a
//! literal has more significant digits than a double can hold, so `Number`
//! wraps [`bigdecimal::BigDecimal`] instead. Equality and ordering are
//! arithmetic; `1` and `1.0` compare and hash equal.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Number(BigDecimal);

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid number literal: {0}")]
pub struct ParseNumberError(pub String);

impl Number {
    pub fn from_i64(v: i64) -> Self {
        Number(BigDecimal::from(v))
    }

    pub fn from_u64(v: u64) -> Self {
        Number(BigDecimal::from(v))
    }

    pub fn from_f64(v: f64) -> Option<Self> {
        BigDecimal::try_from(v).ok().map(Number)
    }

    /// Parse a decimal literal as the lexer would hand it to us, including
    /// scientific notation with arbitrarily large exponents
    /// (`630E-840354372` per §4.1).
    pub fn parse(s: &str) -> Result<Self, ParseNumberError> {
        BigDecimal::from_str(s)
            .map(Number)
            .map_err(|_| ParseNumberError(s.to_owned()))
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    pub fn as_bigdecimal(&self) -> &BigDecimal {
        &self.0
    }

    pub fn to_i64(&self) -> Option<i64> {
        use bigdecimal::ToPrimitive;
        self.0.to_i64()
    }

    pub fn to_f64(&self) -> Option<f64> {
        use bigdecimal::ToPrimitive;
        self.0.to_f64()
    }

    /// Canonical form used for hashing: trailing zeros trimmed so that
    /// arithmetically equal values (`1`, `1.0`, `1.00`) produce the same
    /// hash input.
    fn canonical(&self) -> BigDecimal {
        self.0.normalized()
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash the canonical string form rather than the raw (digits, scale)
        // pair: two BigDecimals can be arithmetically equal with different
        // internal scales, and Hash must agree with Eq (§3 invariant 1).
        self.canonical().to_string().hash(state);
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_decimal_literal_are_equal_and_hash_equal() {
        let a = Number::parse("1").unwrap();
        let b = Number::parse("1.0").unwrap();
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn large_exponent_literals_compare_arithmetically_not_textually() {
        // Per §4.1: a huge negative exponent collapses towards zero, but is
        // not literally equal to zero unless the mantissa is also zero.
        let tiny = Number::parse("630E-840354372").unwrap();
        let zero = Number::from_i64(0);
        assert_ne!(tiny, zero);
    }

    #[test]
    fn near_integer_strings_are_distinguishable() {
        let a = Number::parse("123456789123456789123").unwrap();
        let b = Number::parse("123456789123456789122").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn ordering_is_arithmetic() {
        let a = Number::parse("2").unwrap();
        let b = Number::parse("10").unwrap();
        assert!(a < b);
    }
}
