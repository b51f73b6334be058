//! # Payment Validation
//!
//! Classifies what the customer handed over against the order total.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  paid ≥ total                 → PAID, change = paid − total             │
//! │  paid < total, registered     → DEBT, shortfall goes to the debt ledger │
//! │  paid < total, walk-in        → DEBT, blocking: approval is refused     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `paid` is `cash + transfer` for split payments, otherwise the single amount
//! belonging to the chosen method. The amount of the unused channel is
//! ignored.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::validation::validate_amount;

/// What the cashier entered on the approval screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub cash: Option<i64>,
    pub transfer: Option<i64>,
}

impl PaymentInput {
    pub fn cash(amount: i64) -> Self {
        PaymentInput {
            method: PaymentMethod::Cash,
            cash: Some(amount),
            transfer: None,
        }
    }

    pub fn transfer(amount: i64) -> Self {
        PaymentInput {
            method: PaymentMethod::Transfer,
            cash: None,
            transfer: Some(amount),
        }
    }

    pub fn split(cash: i64, transfer: i64) -> Self {
        PaymentInput {
            method: PaymentMethod::CashAndTransfer,
            cash: Some(cash),
            transfer: Some(transfer),
        }
    }

    /// Amounts per channel after dropping the channel the method doesn't use.
    fn portions(&self) -> (i64, i64) {
        let cash = self.cash.unwrap_or(0);
        let transfer = self.transfer.unwrap_or(0);
        match self.method {
            PaymentMethod::Cash => (cash, 0),
            PaymentMethod::Transfer => (0, transfer),
            PaymentMethod::CashAndTransfer => (cash, transfer),
        }
    }
}

/// Outcome classification of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementStatus {
    Paid,
    Debt,
}

/// Result of [`validate_payment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentAssessment {
    pub status: SettlementStatus,
    pub method: PaymentMethod,
    pub paid: Money,
    pub cash_portion: Money,
    pub transfer_portion: Money,
    pub change: Money,
    pub debt_remaining: Money,
    /// The shortfall cannot be carried (walk-in customer).
    pub blocking: bool,
}

impl PaymentAssessment {
    /// Refuses payments that cannot be settled.
    ///
    /// Walk-in shortfalls are always refused. Registered shortfalls are
    /// refused only when the business disabled customer debt.
    pub fn ensure_settleable(&self, allow_registered_debt: bool) -> CoreResult<()> {
        if self.status == SettlementStatus::Paid {
            return Ok(());
        }

        if self.blocking {
            return Err(CoreError::UnregisteredCustomerDebtNotAllowed {
                debt_remaining: self.debt_remaining.minor(),
            });
        }

        if !allow_registered_debt {
            return Err(CoreError::PaymentBelowTotal {
                blocking: false,
                debt_remaining: self.debt_remaining.minor(),
            });
        }

        Ok(())
    }
}

/// Validates a payment against the order total.
///
/// ## Errors
/// Negative amounts are rejected as `ValidationError::Negative`, amounts above
/// [`MAX_AMOUNT`](crate::MAX_AMOUNT) as `ValidationError::OutOfRange`. A shortfall
/// is *not* an error here; it is reported through `status`/`blocking` so the
/// approval screen can preview it.
///
/// ```rust
/// use kanvas_core::payment::{validate_payment, PaymentInput, SettlementStatus};
/// use kanvas_core::Money;
///
/// let a = validate_payment(Money::from_minor(100_000), &PaymentInput::cash(60_000), false).unwrap();
/// assert_eq!(a.status, SettlementStatus::Debt);
/// assert_eq!(a.debt_remaining.minor(), 40_000);
/// assert!(a.blocking);
/// ```
pub fn validate_payment(
    total: Money,
    input: &PaymentInput,
    has_registered_customer: bool,
) -> CoreResult<PaymentAssessment> {
    let (cash, transfer) = input.portions();
    validate_amount("cash", cash)?;
    validate_amount("transfer", transfer)?;

    let total = total.non_negative();
    // Both portions are bounded by MAX_AMOUNT.
    let paid = Money::from_minor(cash + transfer);

    let assessment = if paid >= total {
        PaymentAssessment {
            status: SettlementStatus::Paid,
            method: input.method,
            paid,
            cash_portion: Money::from_minor(cash),
            transfer_portion: Money::from_minor(transfer),
            change: paid - total,
            debt_remaining: Money::zero(),
            blocking: false,
        }
    } else {
        PaymentAssessment {
            status: SettlementStatus::Debt,
            method: input.method,
            paid,
            cash_portion: Money::from_minor(cash),
            transfer_portion: Money::from_minor(transfer),
            change: Money::zero(),
            debt_remaining: total - paid,
            blocking: !has_registered_customer,
        }
    };

    Ok(assessment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    const TOTAL: Money = Money::from_minor(100_000);

    #[test]
    fn test_exact_cash_is_paid() {
        let a = validate_payment(TOTAL, &PaymentInput::cash(100_000), false).unwrap();
        assert_eq!(a.status, SettlementStatus::Paid);
        assert_eq!(a.change, Money::zero());
        assert!(!a.blocking);
    }

    #[test]
    fn test_overpayment_gives_change() {
        let a = validate_payment(TOTAL, &PaymentInput::transfer(120_000), false).unwrap();
        assert_eq!(a.status, SettlementStatus::Paid);
        assert_eq!(a.change.minor(), 20_000);
        assert_eq!(a.transfer_portion.minor(), 120_000);
        assert_eq!(a.cash_portion, Money::zero());
    }

    #[test]
    fn test_split_payment_sums_both_channels() {
        let a = validate_payment(TOTAL, &PaymentInput::split(30_000, 70_000), false).unwrap();
        assert_eq!(a.status, SettlementStatus::Paid);
        assert_eq!(a.paid.minor(), 100_000);
    }

    #[test]
    fn test_unused_channel_is_ignored() {
        let input = PaymentInput {
            method: PaymentMethod::Cash,
            cash: Some(50_000),
            transfer: Some(50_000),
        };
        let a = validate_payment(TOTAL, &input, true).unwrap();
        assert_eq!(a.status, SettlementStatus::Debt);
        assert_eq!(a.transfer_portion, Money::zero());
        assert_eq!(a.debt_remaining.minor(), 50_000);
    }

    #[test]
    fn test_walk_in_shortfall_is_blocking() {
        let a = validate_payment(TOTAL, &PaymentInput::cash(60_000), false).unwrap();
        assert!(a.blocking);
        let err = a.ensure_settleable(true).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnregisteredCustomerDebtNotAllowed { debt_remaining: 40_000 }
        ));
    }

    #[test]
    fn test_registered_shortfall_becomes_debt() {
        let a = validate_payment(TOTAL, &PaymentInput::cash(60_000), true).unwrap();
        assert_eq!(a.status, SettlementStatus::Debt);
        assert!(!a.blocking);
        assert!(a.ensure_settleable(true).is_ok());
        assert!(matches!(
            a.ensure_settleable(false).unwrap_err(),
            CoreError::PaymentBelowTotal { blocking: false, debt_remaining: 40_000 }
        ));
    }

    #[test]
    fn test_missing_amount_counts_as_zero() {
        let input = PaymentInput {
            method: PaymentMethod::Transfer,
            cash: None,
            transfer: None,
        };
        let a = validate_payment(TOTAL, &input, true).unwrap();
        assert_eq!(a.debt_remaining, TOTAL);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = validate_payment(TOTAL, &PaymentInput::cash(-1), true).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Negative { .. })));
    }

    #[test]
    fn test_oversized_amounts_rejected_without_overflow() {
        let err = validate_payment(TOTAL, &PaymentInput::split(i64::MAX, 1), true).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { max: crate::MAX_AMOUNT, .. })
        ));

        let err = validate_payment(TOTAL, &PaymentInput::transfer(crate::MAX_AMOUNT + 1), true).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));

        let a = validate_payment(TOTAL, &PaymentInput::split(crate::MAX_AMOUNT, crate::MAX_AMOUNT), false).unwrap();
        assert_eq!(a.paid.minor(), 2 * crate::MAX_AMOUNT);
        assert_eq!(a.status, SettlementStatus::Paid);
    }

    #[test]
    fn test_zero_total_is_always_paid() {
        let a = validate_payment(Money::zero(), &PaymentInput::cash(0), false).unwrap();
        assert_eq!(a.status, SettlementStatus::Paid);
    }
}
