//! # Stock Ledger
//!
//! The only code that writes `products.on_hand_units`.
//!
//! ## Delta Convention
//! ```text
//!   reserve(+n)  on_hand -= n   (goods leave: manifest, sale)
//!                fails with InsufficientStock when on_hand < n
//!   reserve(-n)  on_hand += n   (goods come back: shrink, cancel, GOOD return)
//!                always succeeds
//! ```
//!
//! The decrement is a compare-and-swap: the `WHERE on_hand_units >= n` guard
//! is checked by SQLite in the same statement that writes, so a stale read
//! can never push stock below zero.

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::pool::Database;
use kanvas_core::CoreError;

/// Atomic increments and decrements of on-hand stock.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
}

impl StockLedger {
    pub fn new(db: Database) -> Self {
        StockLedger { db }
    }

    /// Units on hand for a product.
    pub async fn available(&self, product_id: &str) -> DbResult<i64> {
        let mut conn = self.db.pool().acquire().await?;
        on_hand(&mut conn, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    /// Applies one delta in its own transaction.
    ///
    /// Positive deltas take stock out, negative deltas put it back.
    /// Returns the new on-hand figure.
    pub async fn reserve(&self, product_id: &str, delta_units: i64) -> DbResult<i64> {
        let mut tx = self.db.begin_write().await?;
        let remaining = apply_delta(tx.conn(), product_id, delta_units).await?;
        tx.commit().await?;

        info!(product_id = %product_id, delta = delta_units, remaining, "Stock reserved");
        Ok(remaining)
    }
}

pub(crate) async fn on_hand(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Option<i64>> {
    let units: Option<i64> = sqlx::query_scalar("SELECT on_hand_units FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(units)
}

/// Applies a delta on the caller's transaction and returns the new on-hand figure.
pub(crate) async fn apply_delta(conn: &mut SqliteConnection, product_id: &str, delta: i64) -> DbResult<i64> {
    let now = Utc::now();

    if delta > 0 {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                on_hand_units = on_hand_units - ?2,
                updated_at = ?3
            WHERE id = ?1 AND on_hand_units >= ?2
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let available = on_hand(conn, product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

            warn!(product_id = %product_id, available, requested = delta, "Insufficient stock");
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available,
                requested: delta,
            }
            .into());
        }
    } else if delta < 0 {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                on_hand_units = on_hand_units + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(-delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
    }

    let remaining = on_hand(conn, product_id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

    debug!(product_id = %product_id, delta, remaining, "Stock delta applied");
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{memory_db, on_hand as stock_of, product};

    #[tokio::test]
    async fn test_reserve_and_release() {
        let db = memory_db().await;
        let p = product(&db, "A", 12, 100, 10_000).await;
        let ledger = db.stock();

        assert_eq!(ledger.reserve(&p.id, 30).await.unwrap(), 70);
        assert_eq!(ledger.reserve(&p.id, -10).await.unwrap(), 80);
        assert_eq!(ledger.reserve(&p.id, 0).await.unwrap(), 80);
        assert_eq!(stock_of(&db, &p.id).await, 80);
    }

    #[tokio::test]
    async fn test_insufficient_stock_reports_numbers() {
        let db = memory_db().await;
        let p = product(&db, "A", 12, 80, 10_000).await;

        let err = db.stock().reserve(&p.id, 120).await.unwrap_err();
        match err.core() {
            Some(CoreError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(*available, 80);
                assert_eq!(*requested, 120);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock_of(&db, &p.id).await, 80);
    }

    #[tokio::test]
    async fn test_exact_stock_can_be_taken() {
        let db = memory_db().await;
        let p = product(&db, "A", 12, 10, 10_000).await;
        assert_eq!(db.stock().reserve(&p.id, 10).await.unwrap(), 0);
        assert!(db.stock().reserve(&p.id, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let db = memory_db().await;
        for delta in [5, -5] {
            let err = db.stock().reserve("nope", delta).await.unwrap_err();
            assert!(matches!(err.core(), Some(CoreError::ProductNotFound(_))));
        }
        assert!(db.stock().available("nope").await.is_err());
    }
}
