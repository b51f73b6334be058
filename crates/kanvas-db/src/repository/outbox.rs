//! # Settlement Outbox Repository
//!
//! Queue of settlement events for collaborators outside the engine.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  OrderSettlementEngine::approve                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. deduct stock, UPDATE sale_orders ... 'APPROVED'            │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO settlement_outbox ('ORDER_APPROVED', ...)       │   │
//! │  │     INSERT INTO settlement_outbox ('DEBT_RECORDED', ...)        │   │
//! │  │     (only for a registered customer with a shortfall)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │     COLLABORATOR (debt ledger, notifications), after commit     │   │
//! │  │                                                                 │   │
//! │  │  1. get_pending(limit)                                          │   │
//! │  │  2. deliver, then mark_delivered(id) or mark_failed(id, err)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  The engine never waits on a collaborator inside a transaction.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use kanvas_core::{OutboxEntry, SettlementEventType};

const OUTBOX_COLUMNS: &str =
    "id, event_type, entity_id, payload, attempts, last_error, created_at, attempted_at, delivered_at";

/// Repository for settlement outbox operations.
#[derive(Debug, Clone)]
pub struct SettlementOutboxRepository {
    pool: SqlitePool,
}

impl SettlementOutboxRepository {
    /// Creates a new SettlementOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettlementOutboxRepository { pool }
    }

    /// Gets undelivered entries, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM settlement_outbox \
             WHERE delivered_at IS NULL ORDER BY created_at ASC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = entries.len(), "Fetched pending settlement events");
        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE settlement_outbox SET
                delivered_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE settlement_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts undelivered entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM settlement_outbox WHERE delivered_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes entries delivered more than `days_old` days ago.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_delivered(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query(
            r#"
            DELETE FROM settlement_outbox
            WHERE delivered_at IS NOT NULL
            AND delivered_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Queues an event on the caller's transaction.
pub(crate) async fn enqueue(
    conn: &mut SqliteConnection,
    event_type: SettlementEventType,
    entity_id: &str,
    payload: &str,
) -> DbResult<OutboxEntry> {
    debug!(event_type = %event_type, entity_id = %entity_id, "Queuing settlement event");

    let entry = OutboxEntry {
        id: generate_id(),
        event_type,
        entity_id: entity_id.to_string(),
        payload: payload.to_string(),
        attempts: 0,
        last_error: None,
        created_at: Utc::now(),
        attempted_at: None,
        delivered_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO settlement_outbox (
            id, event_type, entity_id, payload,
            attempts, last_error, created_at, attempted_at, delivered_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry.id)
    .bind(entry.event_type)
    .bind(&entry.entity_id)
    .bind(&entry.payload)
    .bind(entry.attempts)
    .bind(&entry.last_error)
    .bind(entry.created_at)
    .bind(entry.attempted_at)
    .bind(entry.delivered_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_outbox_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let mut tx = db.begin_write().await.unwrap();
        let first = enqueue(tx.conn(), SettlementEventType::OrderApproved, "o1", "{}")
            .await
            .unwrap();
        let second = enqueue(tx.conn(), SettlementEventType::DebtRecorded, "o1", "{}")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outbox.count_pending().await.unwrap(), 2);

        outbox.mark_failed(&second.id, "debt ledger offline").await.unwrap();
        outbox.mark_delivered(&first.id).await.unwrap();

        let pending = outbox.get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("debt ledger offline"));

        // Delivered just now: not old enough to clean up.
        assert_eq!(outbox.cleanup_delivered(1).await.unwrap(), 0);
        assert_eq!(outbox.cleanup_delivered(0).await.unwrap(), 1);
    }
}
