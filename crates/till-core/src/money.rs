//! # Money Module
//!
//! Provides the `Amount` type for euro values read from and written to the
//! reception ledgers.
//!
//! ## Why Not Integer Cents?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LEDGER AMOUNTS ARE JSON NUMBERS                                        │
//! │                                                                         │
//! │  The realtime ledgers already hold euro amounts as plain numbers:      │
//! │    { "count": 152.5, "difference": -0.3 }                              │
//! │                                                                         │
//! │  Converting to cents on read would change the wire format, so the      │
//! │  value stays an f64 and every comparison goes through EPSILON:         │
//! │                                                                         │
//! │    0.1 + 0.2 - 0.3 = 5.5e-17   →  |Δ| < 0.01  →  balanced             │
//! │    152.51 - 152.50 = 0.01      →  |Δ| ≥ 0.01  →  discrepant           │
//! │                                                                         │
//! │  Exact equality is never used for currency.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Amount;
//!
//! let drawer = Amount::new(152.50);
//! let pos = Amount::new(150.00);
//! let delta = drawer - pos;
//!
//! assert_eq!(delta.to_string(), "€2.50");
//! assert!(!delta.is_negligible());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Amount Type
// =============================================================================

/// A euro amount as stored in the ledgers.
///
/// Serialized transparently as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Amount(f64);

impl Amount {
    /// Tolerance for currency comparisons; deltas strictly below it balance.
    pub const EPSILON: f64 = 0.01;

    /// Creates an amount from a euro value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Amount(value)
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Amount(0.0)
    }

    /// Returns the raw euro value.
    #[inline]
    pub const fn value(&self) -> f64 {
        self.0
    }

    #[inline]
    pub fn abs(&self) -> Self {
        Amount(self.0.abs())
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    /// Finite and not below zero (the aggregate sanity rule).
    #[inline]
    pub fn is_valid_total(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }

    /// Checks whether the value is within [`Amount::EPSILON`] of zero.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Amount;
    ///
    /// assert!(Amount::new(0.009).is_negligible());
    /// assert!(!Amount::new(0.01).is_negligible());
    /// assert!(!Amount::new(-0.01).is_negligible());
    /// ```
    #[inline]
    pub fn is_negligible(&self) -> bool {
        self.0.abs() < Self::EPSILON
    }

    /// True only for an exact zero, used where the ledger stores literal 0.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Rounds to whole cents.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Amount;
    ///
    /// assert_eq!(Amount::new(10.005_1).round_cents(), Amount::new(10.01));
    /// ```
    pub fn round_cents(&self) -> Self {
        Amount((self.0 * 100.0).round() / 100.0)
    }

    /// Variance label with an explicit sign unless short: `+€2.00`, `€-1.00`.
    pub fn signed_label(&self) -> String {
        if self.0 >= 0.0 {
            format!("+{self}")
        } else {
            self.to_string()
        }
    }

    /// Two-decimal figure without the currency sign (`-1.00`).
    pub fn fixed(&self) -> String {
        format!("{:.2}", self.0)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// `€152.50`, `€-5.50`.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "€{:.2}", self.0)
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount(value)
    }
}

impl Add for Amount {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Amount(self.0 + other.0)
    }
}

impl AddAssign for Amount {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Amount {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Amount(self.0 - other.0)
    }
}

impl SubAssign for Amount {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Amount {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Amount::new(152.5).to_string(), "€152.50");
        assert_eq!(Amount::new(-5.5).to_string(), "€-5.50");
        assert_eq!(Amount::zero().to_string(), "€0.00");
    }

    #[test]
    fn test_signed_label() {
        assert_eq!(Amount::new(2.0).signed_label(), "+€2.00");
        assert_eq!(Amount::new(-1.0).signed_label(), "€-1.00");
        assert_eq!(Amount::zero().signed_label(), "+€0.00");
    }

    #[test]
    fn test_epsilon_boundary() {
        assert!(Amount::new(0.009).is_negligible());
        assert!(Amount::new(-0.009).is_negligible());
        assert!(!Amount::new(0.01).is_negligible());
        assert!(!Amount::new(-0.01).is_negligible());
    }

    #[test]
    fn test_float_noise_is_negligible() {
        let delta = Amount::new(0.1) + Amount::new(0.2) - Amount::new(0.3);
        assert!(delta.is_negligible());
        assert!(!delta.is_zero());
    }

    #[test]
    fn test_valid_total() {
        assert!(Amount::zero().is_valid_total());
        assert!(Amount::new(10.0).is_valid_total());
        assert!(!Amount::new(-0.5).is_valid_total());
        assert!(!Amount::new(f64::NAN).is_valid_total());
        assert!(!Amount::new(f64::INFINITY).is_valid_total());
    }

    #[test]
    fn test_sum_and_arithmetic() {
        let amounts = [Amount::new(10.0), Amount::new(2.5), Amount::new(-1.5)];
        let total: Amount = amounts.iter().sum();
        assert_eq!(total, Amount::new(11.0));

        let mut running = Amount::new(5.0);
        running += Amount::new(1.0);
        running -= Amount::new(0.5);
        assert_eq!(running, Amount::new(5.5));
        assert_eq!(-running, Amount::new(-5.5));
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Amount::new(12.5)).unwrap();
        assert_eq!(json, "12.5");
        let back: Amount = serde_json::from_str("3").unwrap();
        assert_eq!(back, Amount::new(3.0));
    }
}
