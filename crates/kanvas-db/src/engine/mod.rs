//! # Ledger Engine
//!
//! The transactional services that move stock.
//!
//! ## Component Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ManifestAllocator ───────┐         ┌────── OrderSettlementEngine      │
//! │   create/edit/cancel       │         │       edit/approve/reject        │
//! │          │                 ▼         ▼                                  │
//! │          │            ┌──────────────────┐                              │
//! │          │            │ DailyCapTracker  │  recomputed from records     │
//! │          │            └──────────────────┘                              │
//! │          │                 │         │                                  │
//! │          ▼                 ▼         ▼                                  │
//! │   ReturnReconciler ──► ┌──────────────────┐                             │
//! │   GOOD → restock       │   StockLedger    │  sole writer of on_hand     │
//! │                        └──────────────────┘                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Unit of Work
//! Every public mutating call takes the write gate, begins one transaction,
//! applies per-line deltas against the persisted state, and commits. Any
//! error drops the transaction: lines already applied in the same call are
//! rolled back with it.

pub mod daily_cap;
pub mod manifest;
pub mod returns;
pub mod settlement;
pub mod stock_ledger;

pub use daily_cap::DailyCapTracker;
pub use manifest::{ExpeditionDetail, ManifestAllocator};
pub use returns::ReturnReconciler;
pub use settlement::{OrderQuote, OrderSettlementEngine, PendingOrder, Settlement};
pub use stock_ledger::StockLedger;
