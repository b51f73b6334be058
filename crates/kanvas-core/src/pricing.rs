//! # Order Pricing
//!
//! Totals are always derived from lines; nothing here is ever read back from
//! storage as truth.
//!
//! ## Line Pricing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  30 pcs of a 12-pack priced 100.000, discount 5.000 per package         │
//! │                                                                         │
//! │  split:     2 packages + 6 pcs                                          │
//! │  subtotal:  2 × 100.000 + round(100.000 × 6 / 12) = 250.000             │
//! │  discount:  2 × 5.000                              =  10.000            │
//! │                                                                         │
//! │  Loose pcs are priced pro-rata but never earn the package discount.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::SaleOrderLine;
use crate::units::UnitConverter;

/// The pricing-relevant view of an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub quantity_units: i64,
    pub units_per_package: i64,
    pub unit_package_price: i64,
    pub discount_per_package: i64,
}

impl PricedLine {
    /// Gross value of the line, rounded once.
    pub fn subtotal(&self) -> Money {
        let split = UnitConverter::to_packages_and_units(self.quantity_units, self.units_per_package);
        let price = Money::from_minor(self.unit_package_price);
        let package_size = UnitConverter::normalize_package_size(self.units_per_package);

        price * split.packages + price.prorate(split.units, package_size)
    }

    /// Discount earned by whole packages only.
    pub fn discount(&self) -> Money {
        let split = UnitConverter::to_packages_and_units(self.quantity_units, self.units_per_package);
        Money::from_minor(self.discount_per_package) * split.packages
    }
}

impl From<&SaleOrderLine> for PricedLine {
    fn from(line: &SaleOrderLine) -> Self {
        PricedLine {
            quantity_units: line.quantity_units,
            units_per_package: line.units_per_package,
            unit_package_price: line.unit_package_price,
            discount_per_package: line.discount_per_package,
        }
    }
}

/// Result of [`compute_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub line_discounts_total: Money,
    pub discount_on_total: Money,
    /// Never negative.
    pub total: Money,
}

/// Computes subtotal, discounts and the payable total of an order.
///
/// ```rust
/// use kanvas_core::pricing::{compute_totals, PricedLine};
/// use kanvas_core::Money;
///
/// let lines = [PricedLine {
///     quantity_units: 30,
///     units_per_package: 12,
///     unit_package_price: 100_000,
///     discount_per_package: 5_000,
/// }];
/// let totals = compute_totals(&lines, Money::from_minor(1_000));
/// assert_eq!(totals.subtotal.minor(), 250_000);
/// assert_eq!(totals.line_discounts_total.minor(), 10_000);
/// assert_eq!(totals.total.minor(), 239_000);
/// ```
pub fn compute_totals(lines: &[PricedLine], discount_on_total: Money) -> OrderTotals {
    let subtotal: Money = lines.iter().map(PricedLine::subtotal).sum();
    let line_discounts_total: Money = lines.iter().map(PricedLine::discount).sum();
    let total = (subtotal - line_discounts_total - discount_on_total).non_negative();

    OrderTotals {
        subtotal,
        line_discounts_total,
        discount_on_total,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, per: i64, price: i64, discount: i64) -> PricedLine {
        PricedLine {
            quantity_units: qty,
            units_per_package: per,
            unit_package_price: price,
            discount_per_package: discount,
        }
    }

    #[test]
    fn test_whole_packages_only() {
        let totals = compute_totals(&[line(24, 12, 50_000, 0)], Money::zero());
        assert_eq!(totals.subtotal.minor(), 100_000);
        assert_eq!(totals.total.minor(), 100_000);
    }

    #[test]
    fn test_loose_units_are_prorated_per_line() {
        // 5 pcs of a 12-pack at 100.000 → 41.666,67 → 41.667
        let totals = compute_totals(&[line(5, 12, 100_000, 0), line(5, 12, 100_000, 0)], Money::zero());
        assert_eq!(totals.subtotal.minor(), 83_334);
    }

    #[test]
    fn test_loose_units_earn_no_package_discount() {
        let totals = compute_totals(&[line(11, 12, 100_000, 10_000)], Money::zero());
        assert_eq!(totals.line_discounts_total, Money::zero());
    }

    #[test]
    fn test_total_never_negative() {
        let cases = [
            (line(12, 12, 10_000, 20_000), Money::zero()),
            (line(1, 12, 10_000, 0), Money::from_minor(1_000_000)),
            (line(0, 12, 10_000, 500), Money::from_minor(1)),
            (line(120, 6, 1, 999_999), Money::from_minor(999_999)),
        ];
        for (l, discount) in cases {
            let totals = compute_totals(&[l], discount);
            assert!(!totals.total.is_negative(), "{l:?} produced {totals:?}");
        }
    }

    #[test]
    fn test_empty_order() {
        let totals = compute_totals(&[], Money::zero());
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_largest_valid_order_does_not_overflow() {
        use crate::{MAX_AMOUNT, MAX_LINES, MAX_LINE_UNITS};

        let lines = vec![line(MAX_LINE_UNITS - 1, 7, MAX_AMOUNT, MAX_AMOUNT); MAX_LINES];
        let totals = compute_totals(&lines, Money::from_minor(MAX_AMOUNT));
        assert!(totals.subtotal.is_positive());
        assert!(totals.line_discounts_total.is_positive());
        assert!(!totals.total.is_negative());
    }

    #[test]
    fn test_degenerate_package_size_prices_per_unit() {
        let totals = compute_totals(&[line(7, 0, 1_500, 100)], Money::zero());
        assert_eq!(totals.subtotal.minor(), 10_500);
        assert_eq!(totals.line_discounts_total.minor(), 700);
    }
}
