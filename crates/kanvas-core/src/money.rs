//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Unit price of a 12-pack priced 100.000:                                │
//! │    100000 / 12 = 8333.333...  (float keeps drifting per line)           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer smallest currency unit                           │
//! │    prorate(100000, 5, 12) = 41667  (rounded once, per line)             │
//! │    We KNOW where the rounding happens, and it happens exactly once      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kanvas_core::money::Money;
//!
//! let package_price = Money::from_minor(100_000);
//! let three_packages = package_price * 3;
//! assert_eq!(three_packages.minor(), 300_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate values (subtotal − discounts) may go negative
///   before they are clamped
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    #[inline]
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the value in the smallest currency unit.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// ```rust
    /// use kanvas_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(-500).non_negative(), Money::zero());
    /// assert_eq!(Money::from_minor(500).non_negative().minor(), 500);
    /// ```
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `self × numerator / denominator`, rounded half-up.
    ///
    /// Used to price loose units as a fraction of a package price. A
    /// non-positive denominator is treated as 1.
    ///
    /// ## Implementation
    /// Integer math in i128: `(amount * num * 2 + den) / (2 * den)`
    ///
    /// ## Example
    /// ```rust
    /// use kanvas_core::money::Money;
    ///
    /// // 5 loose pcs of a 12-pack priced 100.000 → 41.666,67 → 41.667
    /// let price = Money::from_minor(100_000);
    /// assert_eq!(price.prorate(5, 12).minor(), 41_667);
    ///
    /// // exactly half rounds up
    /// assert_eq!(Money::from_minor(3).prorate(1, 2).minor(), 2);
    /// ```
    pub fn prorate(&self, numerator: i64, denominator: i64) -> Money {
        let den = if denominator <= 0 { 1 } else { denominator } as i128;
        let scaled = self.0 as i128 * numerator as i128;
        let rounded = if scaled >= 0 {
            (scaled * 2 + den) / (2 * den)
        } else {
            -((-scaled * 2 + den) / (2 * den))
        };
        Money(rounded as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering. Localised formatting belongs to the front-end.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, qty: i64) -> Money {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().minor(), 2000);
    }

    #[test]
    fn test_prorate_rounds_half_up() {
        let price = Money::from_minor(100_000);
        assert_eq!(price.prorate(1, 12).minor(), 8_333);
        assert_eq!(price.prorate(6, 12).minor(), 50_000);
        assert_eq!(price.prorate(0, 12).minor(), 0);
        assert_eq!(Money::from_minor(5).prorate(1, 2).minor(), 3);
    }

    #[test]
    fn test_prorate_degenerate_denominator() {
        let price = Money::from_minor(700);
        assert_eq!(price.prorate(2, 0).minor(), 1400);
        assert_eq!(price.prorate(2, -4).minor(), 1400);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_minor(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.non_negative(), Money::zero());
    }
}
