//! # kanvas-db: Storage and Ledger Engine for Kanvas
//!
//! This crate owns the warehouse stock ledger of the Kanvas field-sales
//! system: products, expedition manifests, returns, sale orders and the
//! settlement outbox, all in SQLite via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kanvas Data Flow                                 │
//! │                                                                         │
//! │  Admin / agent front-end (out of scope)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kanvas-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    engine     │    │  repository   │    │  migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ Manifests     │───►│ Product       │    │              │  │   │
//! │  │   │ Returns       │    │ Expedition    │    │ 001_initial  │  │   │
//! │  │   │ Settlement    │    │ Order, Outbox │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │          │                                                      │   │
//! │  │          ▼                                                      │   │
//! │  │   Database (pool.rs): SqlitePool + write gate + EngineConfig   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Engine configuration (file, environment, defaults)
//! - [`pool`] - Connection pool, write gate, ledger transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Row-level access per aggregate
//! - [`engine`] - Stock ledger, daily cap, manifests, returns, settlement
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kanvas_db::{Database, EngineConfig};
//! use kanvas_core::ManifestLineInput;
//!
//! let db = Database::open(EngineConfig::load(None)?).await?;
//!
//! let trip = db
//!     .manifests()
//!     .create_expedition("agent-7", "Bogor", vec![ManifestLineInput::new(&product_id, 96)], "admin")
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CalendarSettings, EngineConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, LedgerTx};

pub use engine::{
    DailyCapTracker, ExpeditionDetail, ManifestAllocator, OrderQuote, OrderSettlementEngine,
    PendingOrder, ReturnReconciler, Settlement, StockLedger,
};

// Repository re-exports for convenience
pub use repository::expedition::ExpeditionRepository;
pub use repository::order::OrderRepository;
pub use repository::outbox::SettlementOutboxRepository;
pub use repository::product::{NewProduct, ProductRepository};
