//! # Return Reconciler
//!
//! Records goods an agent brings back from a RETURNED expedition.
//!
//! ```text
//!   GOOD     ──► return_lines + on_hand += units
//!   DAMAGED  ──► return_lines only (written off)
//!   EXPIRED  ──► return_lines only (written off)
//! ```
//!
//! A batch may not return more of a product than is still outstanding on
//! the manifest (`allocated − sold − already returned`), summed over every
//! line of that product in the batch.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::engine::{manifest, stock_ledger};
use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::{expedition, generate_id};
use kanvas_core::validation::{validate_return_lines, validate_text};
use kanvas_core::{CoreError, ExpeditionAction, ReturnLine, ReturnLineInput};

/// Writes return batches and restocks good goods.
#[derive(Debug, Clone)]
pub struct ReturnReconciler {
    db: Database,
}

impl ReturnReconciler {
    pub fn new(db: Database) -> Self {
        ReturnReconciler { db }
    }

    /// Records one batch of returned goods.
    ///
    /// ## Errors
    /// - `InvalidTransition` unless the expedition is RETURNED
    /// - `NotOnManifest` for a product the expedition never carried
    /// - `ReturnExceedsOutstanding` when the batch returns more than is left
    pub async fn record_return(
        &self,
        expedition_id: &str,
        lines: Vec<ReturnLineInput>,
        recorded_by: &str,
    ) -> DbResult<Vec<ReturnLine>> {
        validate_text("recorded_by", recorded_by)?;
        validate_return_lines(&lines)?;

        let mut tx = self.db.begin_write().await?;
        let current = expedition::require(tx.conn(), expedition_id).await?;
        current.status.apply(ExpeditionAction::RecordReturn)?;

        let outstanding: HashMap<String, i64> = manifest::reconcile(tx.conn(), expedition_id)
            .await?
            .into_iter()
            .map(|l| (l.product_id.clone(), l.outstanding()))
            .collect();

        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &lines {
            *requested.entry(line.product_id.as_str()).or_default() += line.returned_units;
        }

        for (product_id, units) in &requested {
            let Some(&left) = outstanding.get(*product_id) else {
                return Err(CoreError::NotOnManifest {
                    expedition_id: expedition_id.to_string(),
                    product_id: product_id.to_string(),
                }
                .into());
            };

            if *units > left {
                warn!(expedition_id = %expedition_id, product_id = %product_id, outstanding = left, requested = units, "Return exceeds outstanding units");
                return Err(CoreError::ReturnExceedsOutstanding {
                    product_id: product_id.to_string(),
                    outstanding: left,
                    requested: *units,
                }
                .into());
            }
        }

        let now = Utc::now();
        let mut recorded = Vec::with_capacity(lines.len());
        let mut restocked = 0;

        for input in lines {
            let line = ReturnLine {
                id: generate_id(),
                expedition_id: expedition_id.to_string(),
                product_id: input.product_id,
                returned_units: input.returned_units,
                condition: input.condition,
                note: input
                    .note
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                recorded_by: recorded_by.trim().to_string(),
                created_at: now,
            };
            expedition::insert_return_line(tx.conn(), &line).await?;

            if line.condition.restocks() {
                stock_ledger::apply_delta(tx.conn(), &line.product_id, -line.returned_units).await?;
                restocked += line.returned_units;
            }

            debug!(
                expedition_id = %expedition_id,
                product_id = %line.product_id,
                units = line.returned_units,
                condition = %line.condition,
                "Return line recorded"
            );
            recorded.push(line);
        }

        tx.commit().await?;

        info!(expedition_id = %expedition_id, lines = recorded.len(), restocked, "Returns recorded");
        Ok(recorded)
    }

    /// Every return line recorded for an expedition.
    pub async fn history(&self, expedition_id: &str) -> DbResult<Vec<ReturnLine>> {
        self.db.expeditions().return_lines(expedition_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{memory_db, on_hand, product};
    use kanvas_core::{ExpeditionStatus, ManifestLineInput, OrderLineInput, PaymentInput, ReturnCondition};

    /// Expedition of 50 units, 25 of them sold on the road, back at the warehouse.
    async fn half_sold_trip(db: &Database) -> (String, String) {
        let p = product(db, "TEH", 10, 200, 50_000).await;
        let detail = db
            .manifests()
            .create_expedition("agent-1", "Bogor", vec![ManifestLineInput::new(&p.id, 50)], "admin")
            .await
            .unwrap();
        let expedition_id = detail.expedition.id;

        let order = db
            .settlement()
            .create_pending_order(
                Some("CUST-1"),
                Some(&expedition_id),
                vec![OrderLineInput::new(&p.id, 25, 50_000)],
                0,
                "agent-1",
            )
            .await
            .unwrap();
        db.settlement()
            .approve(
                &order.order.id,
                vec![OrderLineInput::new(&p.id, 25, 50_000)],
                PaymentInput::cash(125_000),
                "admin",
            )
            .await
            .unwrap();

        db.manifests().mark_returned(&expedition_id).await.unwrap();
        (expedition_id, p.id)
    }

    #[tokio::test]
    async fn test_scenario_c_good_returns_restock_and_trip_closes() {
        let db = memory_db().await;
        let (expedition_id, product_id) = half_sold_trip(&db).await;
        assert_eq!(on_hand(&db, &product_id).await, 150);

        let recorded = db
            .returns()
            .record_return(
                &expedition_id,
                vec![
                    ReturnLineInput::new(&product_id, 20, ReturnCondition::Good),
                    ReturnLineInput::new(&product_id, 5, ReturnCondition::Damaged).with_note("crushed carton"),
                ],
                "warehouse-1",
            )
            .await
            .unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(on_hand(&db, &product_id).await, 170);

        let report = db.manifests().reconciliation(&expedition_id).await.unwrap();
        assert_eq!(report[0].sold, 25);
        assert_eq!(report[0].returned_good, 20);
        assert_eq!(report[0].returned_damaged, 5);
        assert!(report[0].is_reconciled());

        let done = db.manifests().mark_done(&expedition_id).await.unwrap();
        assert_eq!(done.status, ExpeditionStatus::Done);

        let history = db.returns().history(&expedition_id).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_total_checked_against_outstanding() {
        let db = memory_db().await;
        let (expedition_id, product_id) = half_sold_trip(&db).await;

        // 20 + 6 > 25 outstanding, even though each line alone would fit.
        let err = db
            .returns()
            .record_return(
                &expedition_id,
                vec![
                    ReturnLineInput::new(&product_id, 20, ReturnCondition::Good),
                    ReturnLineInput::new(&product_id, 6, ReturnCondition::Expired),
                ],
                "warehouse-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::ReturnExceedsOutstanding { outstanding: 25, requested: 26, .. })
        ));
        assert_eq!(on_hand(&db, &product_id).await, 150);
        assert!(db.returns().history(&expedition_id).await.unwrap().is_empty());

        // Earlier batches count too.
        db.returns()
            .record_return(
                &expedition_id,
                vec![ReturnLineInput::new(&product_id, 20, ReturnCondition::Good)],
                "warehouse-1",
            )
            .await
            .unwrap();
        let err = db
            .returns()
            .record_return(
                &expedition_id,
                vec![ReturnLineInput::new(&product_id, 6, ReturnCondition::Good)],
                "warehouse-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::ReturnExceedsOutstanding { outstanding: 5, requested: 6, .. })
        ));
    }

    #[tokio::test]
    async fn test_product_not_on_manifest() {
        let db = memory_db().await;
        let (expedition_id, _) = half_sold_trip(&db).await;
        let other = product(&db, "KOPI", 10, 10, 1_000).await;

        let err = db
            .returns()
            .record_return(
                &expedition_id,
                vec![ReturnLineInput::new(&other.id, 1, ReturnCondition::Good)],
                "warehouse-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::NotOnManifest { .. })));
        assert_eq!(on_hand(&db, &other.id).await, 10);
    }

    #[tokio::test]
    async fn test_returns_only_after_trip_is_back() {
        let db = memory_db().await;
        let p = product(&db, "TEH", 10, 200, 50_000).await;
        let detail = db
            .manifests()
            .create_expedition("agent-1", "Bogor", vec![ManifestLineInput::new(&p.id, 50)], "admin")
            .await
            .unwrap();

        let err = db
            .returns()
            .record_return(
                &detail.expedition.id,
                vec![ReturnLineInput::new(&p.id, 5, ReturnCondition::Good)],
                "warehouse-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidTransition { .. })));
        assert_eq!(on_hand(&db, &p.id).await, 150);
    }

    #[tokio::test]
    async fn test_duplicate_and_zero_lines_rejected() {
        let db = memory_db().await;
        let (expedition_id, product_id) = half_sold_trip(&db).await;
        let returns = db.returns();

        let err = returns
            .record_return(
                &expedition_id,
                vec![
                    ReturnLineInput::new(&product_id, 2, ReturnCondition::Good),
                    ReturnLineInput::new(&product_id, 3, ReturnCondition::Good),
                ],
                "warehouse-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::DuplicateLine { .. })));

        assert!(returns
            .record_return(
                &expedition_id,
                vec![ReturnLineInput::new(&product_id, 0, ReturnCondition::Good)],
                "warehouse-1",
            )
            .await
            .is_err());
        assert!(returns.record_return(&expedition_id, vec![], "warehouse-1").await.is_err());
    }

    #[tokio::test]
    async fn test_written_off_goods_do_not_restock() {
        let db = memory_db().await;
        let (expedition_id, product_id) = half_sold_trip(&db).await;

        db.returns()
            .record_return(
                &expedition_id,
                vec![
                    ReturnLineInput::new(&product_id, 15, ReturnCondition::Expired),
                    ReturnLineInput::new(&product_id, 10, ReturnCondition::Damaged),
                ],
                "warehouse-1",
            )
            .await
            .unwrap();
        assert_eq!(on_hand(&db, &product_id).await, 150);
        db.manifests().mark_done(&expedition_id).await.unwrap();
    }
}
