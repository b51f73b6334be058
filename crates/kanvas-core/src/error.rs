//! # Error Types
//!
//! Domain-specific error types for kanvas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kanvas-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kanvas-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Stock and cap errors always carry the numeric shortfall
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant is returned before any mutation is committed; a caller that
/// receives one can assume the ledger is exactly as it was before the call.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Expedition cannot be found.
    #[error("Expedition not found: {0}")]
    ExpeditionNotFound(String),

    /// Sale order cannot be found.
    #[error("Sale order not found: {0}")]
    OrderNotFound(String),

    /// The entity's state machine does not allow the requested action.
    ///
    /// ## When This Occurs
    /// - Editing a manifest that is no longer TRAVELING
    /// - Cancelling an expedition twice
    /// - Approving an order that was already approved or rejected
    #[error("{entity} is {from}, cannot {action}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: String,
    },

    /// Not enough stock to cover a positive delta.
    ///
    /// ## User Workflow
    /// ```text
    /// Manifest line: 120 pcs
    ///      │
    ///      ▼
    /// StockLedger: on hand = 80
    ///      │
    ///      ▼
    /// InsufficientStock { available: 80, requested: 120 }
    ///      │
    ///      ▼
    /// UI shows: "Only 80 pcs left in the warehouse"
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The product's daily sell-quantity cap would be exceeded.
    #[error(
        "Daily cap reached for {product_id}: {remaining_units} units ({remaining_packages} packages) remaining today"
    )]
    DailyCapExceeded {
        product_id: String,
        remaining_units: i64,
        remaining_packages: i64,
    },

    /// A line with zero quantity must be removed, not submitted.
    #[error("Line for {product_id} has zero quantity; remove it instead")]
    LineQuantityZero { product_id: String },

    /// The payment does not cover the total and debt is not permitted.
    #[error("Payment is {debt_remaining} below the total")]
    PaymentBelowTotal { blocking: bool, debt_remaining: i64 },

    /// Walk-in customers may not leave a shortfall.
    #[error("Walk-in customers cannot carry debt (short by {debt_remaining})")]
    UnregisteredCustomerDebtNotAllowed { debt_remaining: i64 },

    /// A return batch exceeds what is still out on the road.
    #[error("Return for {product_id} exceeds outstanding units: outstanding {outstanding}, returned {requested}")]
    ReturnExceedsOutstanding {
        product_id: String,
        outstanding: i64,
        requested: i64,
    },

    /// The product was never on this expedition's manifest.
    #[error("Product {product_id} is not on the manifest of expedition {expedition_id}")]
    NotOnManifest {
        expedition_id: String,
        product_id: String,
    },

    /// allocated ≠ sold + returned for some line.
    #[error("Expedition line {product_id} is not reconciled: {outstanding} units unaccounted for")]
    ManifestNotReconciled { product_id: String, outstanding: i64 },

    /// A manifest line cannot shrink below what agents already sold from it.
    #[error("Cannot allocate {requested} units of {product_id}: {sold} already sold")]
    AllocationBelowSold {
        product_id: String,
        sold: i64,
        requested: i64,
    },

    /// The same product appears twice in one batch.
    #[error("Product {product_id} appears more than once")]
    DuplicateLine { product_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Builds an `InvalidTransition` for the given entity.
    pub fn invalid_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        action: impl std::fmt::Display,
    ) -> Self {
        CoreError::InvalidTransition {
            entity,
            from: from.to_string(),
            action: action.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when boundary input doesn't meet requirements.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_error_message_carries_numbers() {
        let err = CoreError::InsufficientStock {
            product_id: "SUSU-1L".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SUSU-1L: available 3, requested 5"
        );
    }

    #[test]
    fn test_daily_cap_message() {
        let err = CoreError::DailyCapExceeded {
            product_id: "p1".to_string(),
            remaining_units: 4,
            remaining_packages: 0,
        };
        assert_eq!(
            err.to_string(),
            "Daily cap reached for p1: 4 units (0 packages) remaining today"
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = CoreError::invalid_transition("Expedition", "CANCELLED", "cancel");
        assert_eq!(err.to_string(), "Expedition is CANCELLED, cannot cancel");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "lines".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
