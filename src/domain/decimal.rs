//! Lossless decimal numeric type backed by rust_decimal.
//!
//! All money, quantity and percentage math in the engine goes through this
//! type. Square roots and fractional powers come from rust_decimal's `maths`
//! feature so no float ever enters P&L, IL or ROI arithmetic.

use rust_decimal::{Decimal as RustDecimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Lossless decimal numeric type for financial calculations.
///
/// Serializes to a JSON number (not string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format as a canonical string (trailing zeros removed, no exponent).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Division that yields `None` instead of panicking on a zero divisor.
    pub fn checked_div(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// Multiplication that yields `None` on overflow.
    pub fn checked_mul(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    pub fn checked_add(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    /// Square root; `None` for negative inputs.
    pub fn sqrt(&self) -> Option<Decimal> {
        self.0.sqrt().map(Decimal)
    }

    /// `self ^ exponent` for a fractional exponent; `None` on overflow or when
    /// the result is not representable.
    pub fn checked_powd(&self, exponent: Decimal) -> Option<Decimal> {
        self.0.checked_powd(exponent.0).map(Decimal)
    }

    /// Round half away from zero to `dp` decimal places.
    pub fn round_dp(&self, dp: u32) -> Decimal {
        Decimal(self.0.round_dp_with_strategy(
            dp,
            rust_decimal::RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// `self / whole * 100`, or `None` when `whole` is zero.
    pub fn percent_of(&self, whole: Decimal) -> Option<Decimal> {
        if whole.is_zero() {
            return None;
        }
        self.checked_div(whole)
            .and_then(|ratio| ratio.checked_mul(Decimal::hundred()))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    /// Panics on a zero divisor; use [`Decimal::checked_div`] when the divisor
    /// is not known to be non-zero.
    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, x| acc + *x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_canonical_string_strips_trailing_zeros() {
        assert_eq!(d("123.4500").to_canonical_string(), "123.45");
        assert_eq!(d("800.00").to_canonical_string(), "800");
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = d("10.5");
        let b = d("2.5");

        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
    }

    #[test]
    fn test_decimal_json_serialization() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");
    }

    #[test]
    fn test_decimal_sum() {
        let total: Decimal = vec![d("500"), d("300"), d("0.25")].into_iter().sum();
        assert_eq!(total, d("800.25"));
    }

    #[test]
    fn test_checked_div_by_zero_is_none() {
        assert_eq!(d("1").checked_div(Decimal::zero()), None);
        assert_eq!(d("1").checked_div(d("4")), Some(d("0.25")));
    }

    #[test]
    fn test_checked_ops_report_overflow() {
        let max = Decimal::new(RustDecimal::MAX);
        assert_eq!(max.checked_mul(d("2")), None);
        assert_eq!(max.checked_add(Decimal::one()), None);
        assert_eq!((-max).checked_sub(Decimal::one()), None);
        assert_eq!(d("10.5").checked_mul(d("2.5")), Some(d("26.25")));
        assert_eq!(d("1").checked_sub(d("3")), Some(d("-2")));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(d("200").percent_of(d("4000")), Some(d("5")));
        assert_eq!(d("200").percent_of(Decimal::zero()), None);
        // Ratio fits but the scaled percentage does not.
        assert_eq!(Decimal::new(RustDecimal::MAX).percent_of(Decimal::one()), None);
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(d("4").sqrt(), Some(d("2")));
        assert_eq!(d("-4").sqrt(), None);
        let root2 = d("2").sqrt().unwrap();
        assert_eq!(root2.round_dp(6), d("1.414214"));
    }

    #[test]
    fn test_checked_powd() {
        let squared = d("1.1").checked_powd(d("2")).unwrap();
        assert_eq!(squared.round_dp(6), d("1.21"));
        let root = d("4").checked_powd(d("0.5")).unwrap();
        assert_eq!(root.round_dp(6), d("2"));
    }

    #[test]
    fn test_round_dp_midpoint_away_from_zero() {
        assert_eq!(d("1.005").round_dp(2), d("1.01"));
        assert_eq!(d("-1.005").round_dp(2), d("-1.01"));
    }
}
