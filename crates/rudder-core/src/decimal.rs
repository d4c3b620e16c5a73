//! Precision-safe decimal types for trading.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Budgets, fills and
//! PnL are all compared against each other, so binary floating point
//! rounding would leak into gate decisions.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Price (or any USD amount) with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with sizes in calculations.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Convert from a venue-supplied float.
    ///
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Decimal::from_f64(value).map(Self)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Clamp negative values to zero.
    #[inline]
    pub fn floor_zero(&self) -> Self {
        if self.0.is_sign_negative() {
            Self::ZERO
        } else {
            *self
        }
    }

    /// Calculate percentage difference from another price, as a fraction.
    #[inline]
    pub fn pct_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        self.0.checked_sub(other.0)?.checked_div(other.0)
    }

    /// `self * rhs`, or `None` on overflow.
    #[inline]
    pub fn checked_mul(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

/// Order quantity with exact decimal precision.
///
/// Always non-negative; direction lives in `OrderSide`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Notional value `size * price`, or `None` if it does not fit a `Decimal`.
    #[inline]
    pub fn notional(&self, price: Price) -> Option<Price> {
        self.0.checked_mul(price.0).map(Price)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Size {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Size {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_pct_from() {
        let p1 = Price::new(dec!(100));
        let p2 = Price::new(dec!(101));

        assert_eq!(p2.pct_from(p1), Some(dec!(0.01)));
        assert_eq!(p2.pct_from(Price::ZERO), None);
        assert_eq!(Price::new(Decimal::MAX).pct_from(Price::new(dec!(0.5))), None);
    }

    #[test]
    fn test_price_from_f64_rejects_non_finite() {
        assert!(Price::from_f64(f64::NAN).is_none());
        assert!(Price::from_f64(f64::INFINITY).is_none());
        assert_eq!(Price::from_f64(1.5), Some(Price::new(dec!(1.5))));
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Price::new(dec!(-3)).floor_zero(), Price::ZERO);
        assert_eq!(Price::new(dec!(3)).floor_zero(), Price::new(dec!(3)));
    }

    #[test]
    fn test_notional_calculation() {
        let size = Size::new(dec!(0.5));
        let price = Price::new(dec!(50000));

        assert_eq!(size.notional(price), Some(Price::new(dec!(25000))));
    }

    #[test]
    fn test_notional_overflow_is_none() {
        let size = Size::new(Decimal::MAX);
        assert_eq!(size.notional(Price::new(dec!(2))), None);
        assert_eq!(Price::new(Decimal::MAX).checked_mul(dec!(1.001)), None);
        assert_eq!(
            Price::new(dec!(100)).checked_mul(dec!(1.5)),
            Some(Price::new(dec!(150)))
        );
    }
}
