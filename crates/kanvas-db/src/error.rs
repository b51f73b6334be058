//! # Database Error Types
//!
//! Error types for database operations and the ledger engine.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Business rule (CoreError)         │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  DbError (this module) ◄──── DbError::Core (transparent) ────┘          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Dashboard handler: maps to HTTP status / user message                 │
//! │                                                                         │
//! │  Any DbError returned from an engine call means the transaction was    │
//! │  dropped before commit: nothing was written.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kanvas_core::CoreError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule refused the operation.
    ///
    /// ## When This Occurs
    /// - Insufficient stock, daily cap reached
    /// - Invalid state machine transition
    /// - Payment shortfall for a walk-in customer
    /// - Unknown product, expedition or order (`CoreError::*NotFound`)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate product code
    /// - Two manifest lines for the same (expedition, product)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. negative on-hand stock).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Outbox payload could not be encoded.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be read or is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Returns the business rule behind this error, if any.
    ///
    /// ```rust,ignore
    /// match db.settlement().approve(&id, lines, payment, "kasir-1").await {
    ///     Err(e) if matches!(e.core(), Some(CoreError::InsufficientStock { .. })) => { /* ... */ }
    ///     other => other?,
    /// }
    /// ```
    pub fn core(&self) -> Option<&CoreError> {
        match self {
            DbError::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
///
/// Lookups go through `fetch_optional` and report missing rows as
/// `CoreError::{Product,Expedition,Order}NotFound`, so a bare `RowNotFound`
/// is unexpected and lands in `Internal`.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<kanvas_core::ValidationError> for DbError {
    fn from(err: kanvas_core::ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_transparent() {
        let err: DbError = CoreError::LineQuantityZero {
            product_id: "p1".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Line for p1 has zero quantity; remove it instead");
        assert!(matches!(err.core(), Some(CoreError::LineQuantityZero { .. })));
    }

    #[test]
    fn test_row_not_found_is_internal() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::Internal(_)));
        assert!(err.core().is_none());
    }
}
