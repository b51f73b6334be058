//! # Repository Module
//!
//! Database repository implementations for Kanvas.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Dashboard read                       Engine write                     │
//! │       │                                    │                            │
//! │       │ db.expeditions().get_by_id(..)     │ db.begin_write()          │
//! │       ▼                                    ▼                            │
//! │  XRepository { pool }                 LedgerTx::conn()                 │
//! │  acquires a pooled connection         &mut SqliteConnection            │
//! │       │                                    │                            │
//! │       └──────────────┬─────────────────────┘                            │
//! │                      ▼                                                  │
//! │        module-level fns: fetch(conn, ..), insert(conn, ..)             │
//! │        (the only place SQL lives)                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine never calls a pool-backed repository method while it holds a
//! transaction: with a single-connection pool that would wait forever.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog reads and inserts
//! - [`ExpeditionRepository`](expedition::ExpeditionRepository) - Expeditions, manifests, returns
//! - [`OrderRepository`](order::OrderRepository) - Sale orders and lines
//! - [`SettlementOutboxRepository`](outbox::SettlementOutboxRepository) - Post-commit event queue

use chrono::NaiveDate;
use uuid::Uuid;

pub mod expedition;
pub mod order;
pub mod outbox;
pub mod product;

/// Generates a business code in format: PREFIX-YYYYMMDD-XXXXXX
///
/// ## Example
/// `EXP-20260302-9f1c0a`
pub fn generate_code(prefix: &str, day: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, day.format("%Y%m%d"), &suffix[..6])
}

/// Generates a new entity ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
