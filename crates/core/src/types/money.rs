//! Monetary amounts backed by decimal arithmetic.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the store's display currency.
///
/// Backed by [`Decimal`] so that cart arithmetic is exact; the pricing engine
/// never works in floats. Amounts are in the currency's standard unit
/// (dollars, not cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from whole currency units.
    #[must_use]
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, clamping at zero.
    ///
    /// Discount application must never drive a total negative, so all
    /// subtraction in the pricing engine goes through this.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        let result = self.0 - rhs.0;
        if result.is_sign_negative() {
            Self::ZERO
        } else {
            Self(result)
        }
    }

    /// Multiply by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Apply a fractional rate (e.g. a tax rate), rounded to cents.
    #[must_use]
    pub fn at_rate(self, rate: Decimal) -> Self {
        Self((self.0 * rate).round_dp(2))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        let small = Money::from_major(10);
        let big = Money::from_major(30);
        assert_eq!(small.saturating_sub(big), Money::ZERO);
        assert_eq!(big.saturating_sub(small), Money::from_major(20));
    }

    #[test]
    fn test_times() {
        assert_eq!(Money::from_major(100).times(2), Money::from_major(200));
        assert_eq!(Money::new(dec("19.99")).times(3), Money::new(dec("59.97")));
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_major(1), Money::from_major(2)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_major(3));
    }

    #[test]
    fn test_at_rate_rounds_to_cents() {
        let tax = Money::new(dec("33.33")).at_rate(dec("0.05"));
        assert_eq!(tax, Money::new(dec("1.67")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(dec("12.5")).to_string(), "$12.50");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_serde_transparent() {
        let money = Money::new(dec("42.10"));
        let json = serde_json::to_string(&money).unwrap();
        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, money);
    }
}
