//! # Daily Cap Tracker
//!
//! How many units of a product were committed on a local calendar day, and
//! how many more may be.
//!
//! ## What Counts
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  committed(product, day) =                                             │
//! │                                                                         │
//! │    Σ quantity_units of APPROVED direct orders (no expedition)          │
//! │      decided within the day                                            │
//! │  + Σ allocated_units of manifests whose expedition departed within     │
//! │      the day and ever left the warehouse (a cancelled trip keeps only  │
//! │      the units it sold on its manifest)                                │
//! │                                                                         │
//! │  Nothing is cached: the sum is recomputed on every check, inside the   │
//! │  caller's transaction, so edits and cancellations can never leave a    │
//! │  stale counter behind.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnection;
use tracing::warn;

use crate::config::CalendarSettings;
use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::product;
use kanvas_core::{DailyCap, Headroom, Product};

/// Read-side view of the daily cap.
#[derive(Debug, Clone)]
pub struct DailyCapTracker {
    db: Database,
}

impl DailyCapTracker {
    pub fn new(db: Database) -> Self {
        DailyCapTracker { db }
    }

    /// Remaining headroom for a product on a local day.
    pub async fn headroom(&self, product_id: &str, day: NaiveDate) -> DbResult<Headroom> {
        Ok(self.load(product_id, day).await?.headroom())
    }

    /// Whether committing `delta` more units on `day` would pass the cap.
    pub async fn would_exceed(&self, product_id: &str, day: NaiveDate, delta: i64) -> DbResult<bool> {
        Ok(self.load(product_id, day).await?.would_exceed(delta))
    }

    /// Units committed on a local day.
    pub async fn committed(&self, product_id: &str, day: NaiveDate) -> DbResult<i64> {
        let mut conn = self.db.pool().acquire().await?;
        committed_units(&mut conn, &self.db.config().calendar, product_id, day).await
    }

    async fn load(&self, product_id: &str, day: NaiveDate) -> DbResult<DailyCap> {
        let mut conn = self.db.pool().acquire().await?;
        let product = product::require(&mut conn, product_id).await?;
        load(&mut conn, &self.db.config().calendar, &product, day).await
    }
}

/// Sums direct sales and manifest allocations of one product on one local day.
pub(crate) async fn committed_units(
    conn: &mut SqliteConnection,
    calendar: &CalendarSettings,
    product_id: &str,
    day: NaiveDate,
) -> DbResult<i64> {
    let (start, end) = calendar.day_bounds(day);

    let committed: i64 = sqlx::query_scalar(
        r#"
        SELECT
            COALESCE((
                SELECT SUM(l.quantity_units)
                FROM sale_order_lines l
                JOIN sale_orders o ON o.id = l.order_id
                WHERE l.product_id = ?1
                  AND o.expedition_id IS NULL
                  AND o.approval_status = 'APPROVED'
                  AND o.decided_at >= ?2 AND o.decided_at < ?3
            ), 0)
          + COALESCE((
                SELECT SUM(m.allocated_units)
                FROM manifest_lines m
                JOIN expeditions e ON e.id = m.expedition_id
                WHERE m.product_id = ?1
                  AND e.status IN ('TRAVELING', 'RETURNED', 'DONE', 'CANCELLED')
                  AND e.departed_at >= ?2 AND e.departed_at < ?3
            ), 0)
        "#,
    )
    .bind(product_id)
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;

    Ok(committed)
}

pub(crate) async fn load(
    conn: &mut SqliteConnection,
    calendar: &CalendarSettings,
    product: &Product,
    day: NaiveDate,
) -> DbResult<DailyCap> {
    let committed = if product.daily_cap_units > 0 {
        committed_units(conn, calendar, &product.id, day).await?
    } else {
        0
    };

    Ok(DailyCap::new(product.daily_cap_units, committed, product.units_per_package))
}

/// Fails with `DailyCapExceeded` if committing `delta` on `day` passes the cap.
pub(crate) async fn ensure_room(
    conn: &mut SqliteConnection,
    calendar: &CalendarSettings,
    product: &Product,
    day: NaiveDate,
    delta: i64,
) -> DbResult<()> {
    if delta <= 0 || product.daily_cap_units <= 0 {
        return Ok(());
    }

    let cap = load(conn, calendar, product, day).await?;
    if let Err(err) = cap.ensure_room(&product.id, delta) {
        warn!(
            product_id = %product.id,
            %day,
            delta,
            remaining = ?cap.headroom().units(),
            "Daily cap reached"
        );
        return Err(err.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{capped_product, memory_db, product};
    use kanvas_core::ManifestLineInput;

    #[tokio::test]
    async fn test_fresh_day_has_full_headroom() {
        let db = memory_db().await;
        let p = capped_product(&db).await;
        let today = db.config().calendar.today();

        assert_eq!(db.daily_cap().headroom(&p.id, today).await.unwrap(), Headroom::Remaining(100));
        assert!(!db.daily_cap().would_exceed(&p.id, today, 100).await.unwrap());
        assert!(db.daily_cap().would_exceed(&p.id, today, 101).await.unwrap());
    }

    #[tokio::test]
    async fn test_uncapped_product_is_unlimited() {
        let db = memory_db().await;
        let p = product(&db, "FREE", 6, 50, 1_000).await;
        let today = db.config().calendar.today();

        assert_eq!(db.daily_cap().headroom(&p.id, today).await.unwrap(), Headroom::Unlimited);
        assert!(!db.daily_cap().would_exceed(&p.id, today, 1_000_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_allocations_count_only_on_departure_day() {
        let db = memory_db().await;
        let p = capped_product(&db).await;
        let today = db.config().calendar.today();

        db.manifests()
            .create_expedition("agent-1", "Bogor", vec![ManifestLineInput::new(&p.id, 60)], "admin")
            .await
            .unwrap();

        assert_eq!(db.daily_cap().committed(&p.id, today).await.unwrap(), 60);
        assert_eq!(db.daily_cap().headroom(&p.id, today).await.unwrap(), Headroom::Remaining(40));

        let tomorrow = today.succ_opt().unwrap();
        assert_eq!(db.daily_cap().committed(&p.id, tomorrow).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_expedition_frees_headroom() {
        let db = memory_db().await;
        let p = capped_product(&db).await;
        let today = db.config().calendar.today();

        let detail = db
            .manifests()
            .create_expedition("agent-1", "Bogor", vec![ManifestLineInput::new(&p.id, 96)], "admin")
            .await
            .unwrap();
        db.manifests().cancel_expedition(&detail.expedition.id).await.unwrap();

        assert_eq!(db.daily_cap().headroom(&p.id, today).await.unwrap(), Headroom::Remaining(100));
    }
}
