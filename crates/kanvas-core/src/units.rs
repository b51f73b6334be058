//! # Unit Conversion
//!
//! Products are stocked in atomic units (pcs) and sold either by the package
//! (dus / kemasan) or loose. Everything past the input boundary reasons in
//! atomic units; packages only come back for display.
//!
//! ```text
//!   UI input: 2 dus + 6 pcs  ──► to_total_units ──► 30 pcs ──► engine
//!   engine:   30 pcs         ──► to_packages_and_units ──► "2 dus 6 pcs"
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A quantity split into whole packages and a loose remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PackageSplit {
    pub packages: i64,
    pub units: i64,
}

/// Stateless package/unit converter.
pub struct UnitConverter;

impl UnitConverter {
    /// Normalises `units_per_package`: anything below 1 is a one-unit package.
    #[inline]
    pub const fn normalize_package_size(units_per_package: i64) -> i64 {
        if units_per_package < 1 {
            1
        } else {
            units_per_package
        }
    }

    /// Splits a total into whole packages and loose units.
    ///
    /// Negative totals clamp to zero.
    ///
    /// ```rust
    /// use kanvas_core::units::UnitConverter;
    ///
    /// let split = UnitConverter::to_packages_and_units(100, 12);
    /// assert_eq!((split.packages, split.units), (8, 4));
    ///
    /// let split = UnitConverter::to_packages_and_units(-5, 12);
    /// assert_eq!((split.packages, split.units), (0, 0));
    /// ```
    pub fn to_packages_and_units(total_units: i64, units_per_package: i64) -> PackageSplit {
        let per = Self::normalize_package_size(units_per_package);
        let total = total_units.max(0);
        PackageSplit {
            packages: total / per,
            units: total % per,
        }
    }

    /// Combines packages and loose units into atomic units.
    ///
    /// Negative inputs clamp to zero. A remainder larger than a package is
    /// accepted as-is (`1 dus + 14 pcs` of a 12-pack is 26 pcs).
    pub fn to_total_units(packages: i64, remainder_units: i64, units_per_package: i64) -> i64 {
        let per = Self::normalize_package_size(units_per_package);
        packages.max(0) * per + remainder_units.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_join() {
        let split = UnitConverter::to_packages_and_units(30, 12);
        assert_eq!(split, PackageSplit { packages: 2, units: 6 });
        assert_eq!(UnitConverter::to_total_units(2, 6, 12), 30);
    }

    #[test]
    fn test_degenerate_package_size() {
        let split = UnitConverter::to_packages_and_units(7, 0);
        assert_eq!(split, PackageSplit { packages: 7, units: 0 });
        assert_eq!(UnitConverter::to_total_units(3, 2, -1), 5);
    }

    #[test]
    fn test_negative_inputs_clamp() {
        assert_eq!(UnitConverter::to_total_units(-2, 5, 12), 5);
        assert_eq!(UnitConverter::to_total_units(1, -5, 12), 12);
        assert_eq!(
            UnitConverter::to_packages_and_units(-1, 12),
            PackageSplit { packages: 0, units: 0 }
        );
    }

    #[test]
    fn test_split_is_inverse_of_join() {
        for per in 1..=24 {
            for total in 0..100 {
                let split = UnitConverter::to_packages_and_units(total, per);
                assert!(split.units < per);
                assert_eq!(UnitConverter::to_total_units(split.packages, split.units, per), total);
            }
        }
    }
}
