//! # Domain Types
//!
//! Core domain types used throughout Kanvas.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   Expedition    │   │   SaleOrder     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  units/package  │   │  status         │   │  approval       │       │
//! │  │  on_hand_units  │◄──│  ManifestLine*  │◄──│  expedition_id? │       │
//! │  │  daily_cap      │   │  ReturnLine*    │   │  SaleOrderLine* │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  All quantities are atomic units (pcs). All money is i64 minor units.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (`code`) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::units::{PackageSplit, UnitConverter};

// =============================================================================
// Product
// =============================================================================

/// A product in the warehouse catalog.
///
/// Catalog CRUD lives outside this crate; the engine only ever writes
/// `on_hand_units`, and only through the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier shown on manifests and receipts.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Atomic units in one package (dus). Always ≥ 1 in a healthy catalog.
    pub units_per_package: i64,

    /// Units physically in the warehouse and not reserved by any manifest.
    pub on_hand_units: i64,

    /// Maximum units committed per calendar day. 0 = unlimited.
    pub daily_cap_units: i64,

    /// Price of one whole package, in the smallest currency unit.
    pub package_price: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the package price as Money.
    #[inline]
    pub fn package_price(&self) -> Money {
        Money::from_minor(self.package_price)
    }

    /// Package size with the degenerate-product rule applied.
    #[inline]
    pub fn package_size(&self) -> i64 {
        UnitConverter::normalize_package_size(self.units_per_package)
    }

    /// Splits a quantity of this product for display.
    pub fn split(&self, units: i64) -> PackageSplit {
        UnitConverter::to_packages_and_units(units, self.units_per_package)
    }
}

// =============================================================================
// Expedition
// =============================================================================

/// Lifecycle of a travelling sales expedition (perjalanan).
///
/// ```text
///   PREP ──► TRAVELING ──► RETURNED ──► DONE
///     │          │
///     └──────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpeditionStatus {
    /// Planned, nothing reserved yet.
    Prep,
    /// Stock is out with the agent.
    Traveling,
    /// Agent is back; returns and late settlements are recorded.
    Returned,
    /// Reconciled and closed.
    Done,
    /// Unwound; every unsold unit went back to the warehouse.
    Cancelled,
}

impl Default for ExpeditionStatus {
    fn default() -> Self {
        ExpeditionStatus::Prep
    }
}

impl fmt::Display for ExpeditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpeditionStatus::Prep => "PREP",
            ExpeditionStatus::Traveling => "TRAVELING",
            ExpeditionStatus::Returned => "RETURNED",
            ExpeditionStatus::Done => "DONE",
            ExpeditionStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A batch of stock taken out by a travelling sales agent.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expedition {
    pub id: String,
    pub code: String,
    pub agent_id: String,
    pub destination: String,
    pub status: ExpeditionStatus,
    /// Departure time. Its local calendar day is the day the manifest
    /// allocation counts against the daily cap.
    #[ts(as = "String")]
    pub departed_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub returned_at: Option<DateTime<Utc>>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Units of one product reserved out of the warehouse for an expedition.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ManifestLine {
    pub id: String,
    pub expedition_id: String,
    pub product_id: String,
    pub allocated_units: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Condition of goods coming back from an expedition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReturnCondition {
    /// Sellable again; goes back on hand.
    Good,
    /// Written off.
    Damaged,
    /// Written off.
    Expired,
}

impl ReturnCondition {
    /// Only good goods re-enter the stock ledger.
    #[inline]
    pub const fn restocks(&self) -> bool {
        matches!(self, ReturnCondition::Good)
    }
}

impl fmt::Display for ReturnCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReturnCondition::Good => "GOOD",
            ReturnCondition::Damaged => "DAMAGED",
            ReturnCondition::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Audit record of goods returned from an expedition.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnLine {
    pub id: String,
    pub expedition_id: String,
    pub product_id: String,
    pub returned_units: i64,
    pub condition: ReturnCondition,
    pub note: Option<String>,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Where every allocated unit of one manifest line ended up.
///
/// `allocated = sold + returned_good + returned_damaged + returned_expired`
/// must hold before an expedition can be closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineReconciliation {
    pub product_id: String,
    pub allocated: i64,
    pub sold: i64,
    pub returned_good: i64,
    pub returned_damaged: i64,
    pub returned_expired: i64,
}

impl LineReconciliation {
    /// Units not yet accounted for by a sale or a return.
    #[inline]
    pub fn outstanding(&self) -> i64 {
        self.allocated - self.sold - self.returned()
    }

    /// Units returned in any condition.
    #[inline]
    pub fn returned(&self) -> i64 {
        self.returned_good + self.returned_damaged + self.returned_expired
    }

    /// True once every allocated unit is accounted for.
    #[inline]
    pub fn is_reconciled(&self) -> bool {
        self.outstanding() == 0
    }
}

// =============================================================================
// Sale Order
// =============================================================================

/// Approval side of a sale order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        ApprovalStatus::Pending
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Transaction side of a sale order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    /// Still a cart: quantities and prices may change.
    Cart,
    /// Settled; stock has left.
    Complete,
    /// Rejected before settlement.
    Cancelled,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Cart
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Cart => "CART",
            TransactionStatus::Complete => "COMPLETE",
            TransactionStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// How the customer paid.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Physical cash.
    Cash,
    /// Bank transfer.
    Transfer,
    /// Split between cash and transfer.
    CashAndTransfer,
}

/// A sale order, pending approval or settled.
///
/// `subtotal`, `total`, `change_due` and `debt_remaining` are a snapshot
/// written by the approval recompute; before approval they are zero and
/// must not be read as truth.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleOrder {
    pub id: String,
    pub code: String,
    /// Registered customer; `None` for walk-in customers.
    pub customer_ref: Option<String>,
    /// Expedition whose manifest the goods come from; `None` for direct sales.
    pub expedition_id: Option<String>,
    pub approval_status: ApprovalStatus,
    pub transaction_status: TransactionStatus,
    pub discount_on_total: i64,
    pub payment_method: Option<PaymentMethod>,
    pub amount_paid: i64,
    pub cash_portion: i64,
    pub transfer_portion: i64,
    pub subtotal: i64,
    pub total: i64,
    pub change_due: i64,
    pub debt_remaining: i64,
    pub created_by: String,
    pub decided_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl SaleOrder {
    /// True for walk-in customers.
    #[inline]
    pub fn is_walk_in(&self) -> bool {
        self.customer_ref.is_none()
    }
}

/// A line on a sale order. Quantity is always atomic units.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleOrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity_units: i64,
    /// Package size at the time the line was written (snapshot).
    pub units_per_package: i64,
    pub unit_package_price: i64,
    pub discount_per_package: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Settlement Outbox
// =============================================================================

/// Events handed to collaborators (debt ledger, notifications) after commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementEventType {
    /// An order was approved; payload is the order snapshot.
    OrderApproved,
    /// A registered customer left a shortfall; payload is `(customer_ref, debt_remaining)`.
    DebtRecorded,
}

impl fmt::Display for SettlementEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SettlementEventType::OrderApproved => "ORDER_APPROVED",
            SettlementEventType::DebtRecorded => "DEBT_RECORDED",
        };
        f.write_str(s)
    }
}

/// Entry in the settlement outbox.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OutboxEntry {
    pub id: String,
    pub event_type: SettlementEventType,
    /// The sale order the event is about.
    pub entity_id: String,
    /// Event body as JSON.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Payload of a `DEBT_RECORDED` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtRecorded {
    pub order_id: String,
    pub customer_ref: String,
    pub debt_remaining: i64,
}

// =============================================================================
// Operation Inputs
// =============================================================================

/// One requested manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ManifestLineInput {
    pub product_id: String,
    pub total_units: i64,
}

impl ManifestLineInput {
    pub fn new(product_id: impl Into<String>, total_units: i64) -> Self {
        ManifestLineInput {
            product_id: product_id.into(),
            total_units,
        }
    }

    /// Normalises a "packages + loose units" form input.
    pub fn from_packages(
        product_id: impl Into<String>,
        packages: i64,
        units: i64,
        units_per_package: i64,
    ) -> Self {
        ManifestLineInput {
            product_id: product_id.into(),
            total_units: UnitConverter::to_total_units(packages, units, units_per_package),
        }
    }
}

/// One line of a returned-goods batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnLineInput {
    pub product_id: String,
    pub returned_units: i64,
    pub condition: ReturnCondition,
    pub note: Option<String>,
}

impl ReturnLineInput {
    pub fn new(product_id: impl Into<String>, returned_units: i64, condition: ReturnCondition) -> Self {
        ReturnLineInput {
            product_id: product_id.into(),
            returned_units,
            condition,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// One line of a pending or final sale order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineInput {
    pub product_id: String,
    pub quantity_units: i64,
    pub unit_package_price: i64,
    pub discount_per_package: i64,
}

impl OrderLineInput {
    pub fn new(product_id: impl Into<String>, quantity_units: i64, unit_package_price: i64) -> Self {
        OrderLineInput {
            product_id: product_id.into(),
            quantity_units,
            unit_package_price,
            discount_per_package: 0,
        }
    }

    pub fn with_discount(mut self, discount_per_package: i64) -> Self {
        self.discount_per_package = discount_per_package;
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
