//! # kanvas-core: Pure Business Logic for Kanvas
//!
//! This crate holds every rule of the expedition stock and settlement engine
//! that can be expressed without touching the database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kanvas Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Admin / cashier dashboard (external)               │   │
//! │  │   Expedition form ──► Return form ──► Order approval screen    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ package + unit inputs                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kanvas-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  units  │ │ pricing │ │ payment │ │   cap   │ │  state  │  │   │
//! │  │   │ dus/pcs │ │ totals  │ │PAID/DEBT│ │headroom │ │ machines│  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            kanvas-db (repositories + ledger engine)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Expedition, SaleOrder, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`units`] - Package ⇄ atomic unit conversion
//! - [`pricing`] - Order totals with package-prorated unit pricing
//! - [`payment`] - Cash / transfer / split payment classification
//! - [`cap`] - Daily sell-quantity cap arithmetic
//! - [`state`] - Expedition and sale order state machines
//! - [`error`] - Domain error types
//! - [`validation`] - Boundary input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use kanvas_core::units::UnitConverter;
//!
//! // 30 pcs of a product packed 12 per carton = 2 cartons + 6 pcs
//! let split = UnitConverter::to_packages_and_units(30, 12);
//! assert_eq!((split.packages, split.units), (2, 6));
//! assert_eq!(UnitConverter::to_total_units(2, 6, 12), 30);
//! ```

pub mod cap;
pub mod error;
pub mod money;
pub mod payment;
pub mod pricing;
pub mod state;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cap::{DailyCap, Headroom};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payment::{validate_payment, PaymentAssessment, PaymentInput, SettlementStatus};
pub use pricing::{compute_totals, OrderTotals, PricedLine};
pub use state::{ExpeditionAction, OrderAction, OrderState};
pub use types::*;
pub use units::{PackageSplit, UnitConverter};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines on one manifest, return batch or order.
///
/// ## Business Reason
/// A single truck or cart never carries more SKUs than this; larger payloads
/// are almost always a client bug (duplicated rows).
pub const MAX_LINES: usize = 200;

/// Maximum atomic units on a single line.
pub const MAX_LINE_UNITS: i64 = 1_000_000;

/// Maximum money amount accepted as input (prices, discounts, payments).
///
/// `MAX_LINES × MAX_LINE_UNITS × MAX_AMOUNT` stays below `i64::MAX`, so
/// order totals computed from validated input cannot overflow.
pub const MAX_AMOUNT: i64 = 10_000_000_000;
