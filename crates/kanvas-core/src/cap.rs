//! # Daily Cap Arithmetic
//!
//! Some products may only leave the business up to a fixed number of units per
//! calendar day, whether sold over the counter or loaded onto an expedition.
//!
//! The committed figure is always recomputed from the day's records by the
//! caller (see `kanvas_db::engine::daily_cap`); this module only does the math.
//!
//! ```text
//!   cap 100, committed 96 ──► headroom 4 ──► +12 requested ──► DailyCapExceeded
//!                                                              { remaining_units: 4,
//!                                                                remaining_packages: 0 }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::units::UnitConverter;

/// Remaining room under a daily cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "units", rename_all = "snake_case")]
pub enum Headroom {
    /// The product has no cap.
    Unlimited,
    /// Units that may still be committed today.
    Remaining(i64),
}

impl Headroom {
    /// Remaining units, or `None` when unlimited.
    #[inline]
    pub fn units(&self) -> Option<i64> {
        match self {
            Headroom::Unlimited => None,
            Headroom::Remaining(units) => Some(*units),
        }
    }
}

/// A product's cap and what has been committed against it on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCap {
    /// Configured cap, 0 = unlimited.
    pub cap_units: i64,
    /// Units committed today (direct sales + manifest allocations).
    pub committed_units: i64,
    /// Package size, used to phrase the remaining room in packages.
    pub units_per_package: i64,
}

impl DailyCap {
    pub fn new(cap_units: i64, committed_units: i64, units_per_package: i64) -> Self {
        DailyCap {
            cap_units,
            committed_units,
            units_per_package,
        }
    }

    /// `max(0, cap − committed)`, or unlimited when the cap is 0.
    pub fn headroom(&self) -> Headroom {
        if self.cap_units <= 0 {
            return Headroom::Unlimited;
        }
        Headroom::Remaining((self.cap_units - self.committed_units).max(0))
    }

    /// True when committing `delta` more units would pass the cap.
    ///
    /// Non-positive deltas never exceed: shrinking is always allowed, even
    /// when the day is already over the cap.
    pub fn would_exceed(&self, delta: i64) -> bool {
        if delta <= 0 {
            return false;
        }
        match self.headroom() {
            Headroom::Unlimited => false,
            Headroom::Remaining(remaining) => delta > remaining,
        }
    }

    /// Fails with `DailyCapExceeded` naming the exact remaining room.
    ///
    /// ```rust
    /// use kanvas_core::{CoreError, DailyCap};
    ///
    /// let cap = DailyCap::new(100, 96, 12);
    /// let err = cap.ensure_room("p1", 12).unwrap_err();
    /// assert!(matches!(
    ///     err,
    ///     CoreError::DailyCapExceeded { remaining_units: 4, remaining_packages: 0, .. }
    /// ));
    /// assert!(cap.ensure_room("p1", 4).is_ok());
    /// ```
    pub fn ensure_room(&self, product_id: &str, delta: i64) -> CoreResult<()> {
        if !self.would_exceed(delta) {
            return Ok(());
        }

        let remaining = self.headroom().units().unwrap_or(0);
        let split = UnitConverter::to_packages_and_units(remaining, self.units_per_package);

        Err(CoreError::DailyCapExceeded {
            product_id: product_id.to_string(),
            remaining_units: remaining,
            remaining_packages: split.packages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_cap_is_unlimited() {
        let cap = DailyCap::new(0, 1_000_000, 12);
        assert_eq!(cap.headroom(), Headroom::Unlimited);
        assert!(!cap.would_exceed(i64::MAX));
    }

    #[test]
    fn test_headroom_never_negative() {
        let cap = DailyCap::new(100, 130, 12);
        assert_eq!(cap.headroom(), Headroom::Remaining(0));
    }

    #[test]
    fn test_exact_fit_is_allowed() {
        let cap = DailyCap::new(100, 0, 12);
        assert!(!cap.would_exceed(100));
        assert!(cap.would_exceed(101));
    }

    #[test]
    fn test_shrinking_allowed_over_cap() {
        let cap = DailyCap::new(100, 150, 12);
        assert!(!cap.would_exceed(-20));
        assert!(!cap.would_exceed(0));
        assert!(cap.ensure_room("p", -20).is_ok());
    }

    #[test]
    fn test_remaining_packages() {
        let cap = DailyCap::new(100, 70, 12);
        match cap.ensure_room("p", 31).unwrap_err() {
            CoreError::DailyCapExceeded {
                remaining_units,
                remaining_packages,
                ..
            } => {
                assert_eq!(remaining_units, 30);
                assert_eq!(remaining_packages, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
