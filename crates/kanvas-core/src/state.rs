//! # State Machines
//!
//! The only place where expedition and sale order transitions are decided.
//! Repositories persist the status returned here and guard their UPDATEs with
//! the status they read, so a repeated call fails instead of re-applying.
//!
//! ```text
//!  Expedition                             SaleOrder (approval / transaction)
//!  ──────────                             ──────────────────────────────────
//!  PREP ──dispatch──► TRAVELING           PENDING/CART ──approve──► APPROVED/COMPLETE
//!  TRAVELING ──edit──► TRAVELING          PENDING/CART ──reject───► REJECTED/CANCELLED
//!  TRAVELING ──return──► RETURNED         PENDING/CART ──edit─────► PENDING/CART
//!  RETURNED ──record returns──► RETURNED
//!  RETURNED ──close──► DONE
//!  PREP | TRAVELING ──cancel──► CANCELLED
//! ```

use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{ApprovalStatus, ExpeditionStatus, TransactionStatus};

// =============================================================================
// Expedition
// =============================================================================

/// Everything that can happen to an expedition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpeditionAction {
    Dispatch,
    EditManifest,
    MarkReturned,
    RecordReturn,
    MarkDone,
    Cancel,
}

impl fmt::Display for ExpeditionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpeditionAction::Dispatch => "dispatch",
            ExpeditionAction::EditManifest => "edit manifest",
            ExpeditionAction::MarkReturned => "mark returned",
            ExpeditionAction::RecordReturn => "record returns",
            ExpeditionAction::MarkDone => "mark done",
            ExpeditionAction::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

impl ExpeditionStatus {
    /// Applies an action and returns the next status.
    ///
    /// ```rust
    /// use kanvas_core::{ExpeditionAction, ExpeditionStatus};
    ///
    /// let next = ExpeditionStatus::Traveling.apply(ExpeditionAction::Cancel).unwrap();
    /// assert_eq!(next, ExpeditionStatus::Cancelled);
    /// assert!(next.apply(ExpeditionAction::Cancel).is_err());
    /// ```
    pub fn apply(self, action: ExpeditionAction) -> CoreResult<ExpeditionStatus> {
        use ExpeditionAction as A;
        use ExpeditionStatus as S;

        let next = match (self, action) {
            (S::Prep, A::Dispatch) => S::Traveling,
            (S::Traveling, A::EditManifest) => S::Traveling,
            (S::Traveling, A::MarkReturned) => S::Returned,
            (S::Returned, A::RecordReturn) => S::Returned,
            (S::Returned, A::MarkDone) => S::Done,
            (S::Prep | S::Traveling, A::Cancel) => S::Cancelled,
            (from, action) => return Err(CoreError::invalid_transition("Expedition", from, action)),
        };

        Ok(next)
    }

    /// DONE and CANCELLED never change again.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ExpeditionStatus::Done | ExpeditionStatus::Cancelled)
    }
}

// =============================================================================
// Sale Order
// =============================================================================

/// Everything that can happen to a sale order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Edit,
    Approve,
    Reject,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderAction::Edit => "edit",
            OrderAction::Approve => "approve",
            OrderAction::Reject => "reject",
        };
        f.write_str(s)
    }
}

/// The (approval, transaction) status pair of a sale order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderState {
    pub approval: ApprovalStatus,
    pub transaction: TransactionStatus,
}

impl OrderState {
    /// A freshly created order.
    pub const PENDING: OrderState = OrderState {
        approval: ApprovalStatus::Pending,
        transaction: TransactionStatus::Cart,
    };

    pub const fn new(approval: ApprovalStatus, transaction: TransactionStatus) -> Self {
        OrderState {
            approval,
            transaction,
        }
    }

    /// Applies an action and returns the next state pair.
    ///
    /// Only PENDING orders move; APPROVED and REJECTED are final.
    pub fn apply(self, action: OrderAction) -> CoreResult<OrderState> {
        if self.approval != ApprovalStatus::Pending {
            return Err(CoreError::invalid_transition("Sale order", self.approval, action));
        }

        let next = match action {
            OrderAction::Edit => self,
            OrderAction::Approve => OrderState::new(ApprovalStatus::Approved, TransactionStatus::Complete),
            OrderAction::Reject => OrderState::new(ApprovalStatus::Rejected, TransactionStatus::Cancelled),
        };

        Ok(next)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expedition_happy_path() {
        let s = ExpeditionStatus::Prep
            .apply(ExpeditionAction::Dispatch)
            .and_then(|s| s.apply(ExpeditionAction::EditManifest))
            .and_then(|s| s.apply(ExpeditionAction::MarkReturned))
            .and_then(|s| s.apply(ExpeditionAction::RecordReturn))
            .and_then(|s| s.apply(ExpeditionAction::MarkDone))
            .unwrap();
        assert_eq!(s, ExpeditionStatus::Done);
        assert!(s.is_terminal());
    }

    #[test]
    fn test_cannot_return_from_prep() {
        let err = ExpeditionStatus::Prep
            .apply(ExpeditionAction::MarkReturned)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cancel_only_before_return() {
        assert!(ExpeditionStatus::Prep.apply(ExpeditionAction::Cancel).is_ok());
        assert!(ExpeditionStatus::Traveling.apply(ExpeditionAction::Cancel).is_ok());
        assert!(ExpeditionStatus::Returned.apply(ExpeditionAction::Cancel).is_err());
        assert!(ExpeditionStatus::Done.apply(ExpeditionAction::Cancel).is_err());
        assert!(ExpeditionStatus::Cancelled.apply(ExpeditionAction::Cancel).is_err());
    }

    #[test]
    fn test_edit_only_while_traveling() {
        assert!(ExpeditionStatus::Prep.apply(ExpeditionAction::EditManifest).is_err());
        assert!(ExpeditionStatus::Returned.apply(ExpeditionAction::EditManifest).is_err());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let actions = [
            ExpeditionAction::Dispatch,
            ExpeditionAction::EditManifest,
            ExpeditionAction::MarkReturned,
            ExpeditionAction::RecordReturn,
            ExpeditionAction::MarkDone,
            ExpeditionAction::Cancel,
        ];
        for status in [ExpeditionStatus::Done, ExpeditionStatus::Cancelled] {
            for action in actions {
                assert!(status.apply(action).is_err(), "{status} accepted {action}");
            }
        }
    }

    #[test]
    fn test_order_transitions() {
        let approved = OrderState::PENDING.apply(OrderAction::Approve).unwrap();
        assert_eq!(approved.approval, ApprovalStatus::Approved);
        assert_eq!(approved.transaction, TransactionStatus::Complete);

        let rejected = OrderState::PENDING.apply(OrderAction::Reject).unwrap();
        assert_eq!(rejected.transaction, TransactionStatus::Cancelled);

        assert!(approved.apply(OrderAction::Reject).is_err());
        assert!(rejected.apply(OrderAction::Approve).is_err());
        assert!(approved.apply(OrderAction::Edit).is_err());
    }
}
