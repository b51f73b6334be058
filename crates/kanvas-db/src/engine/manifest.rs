//! # Manifest Allocator
//!
//! Reserves warehouse stock for travelling sales expeditions and unwinds it.
//!
//! ## Expedition Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  plan_expedition ──► PREP ──dispatch_expedition──► TRAVELING           │
//! │  create_expedition = plan + dispatch, one transaction                  │
//! │                                                                         │
//! │  TRAVELING ──edit_manifest──► TRAVELING     per-line delta vs. stored  │
//! │  TRAVELING ──mark_returned──► RETURNED      no stock movement          │
//! │  RETURNED  ──(returns, late sales)                                     │
//! │  RETURNED  ──mark_done──────► DONE          every unit accounted for   │
//! │  PREP | TRAVELING ──cancel──► CANCELLED     unsold units restocked     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Edits Are Deltas
//! ```text
//!   stored 50 ──edit to 30──► delta −20 ──► on_hand +20
//!   stored 30 ──edit to 80──► delta +50 ──► cap check (+50), on_hand −50
//! ```
//! The delta is always taken against the persisted allocation, so editing
//! `X → A → B` ends in the same state as `X → B`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info, warn};

use crate::config::CalendarSettings;
use crate::engine::{daily_cap, stock_ledger};
use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::expedition;
use crate::repository::{generate_code, generate_id, product};
use kanvas_core::validation::{validate_manifest_lines, validate_text};
use kanvas_core::{
    CoreError, Expedition, ExpeditionAction, ExpeditionStatus, LineReconciliation, ManifestLine,
    ManifestLineInput, ReturnCondition, ValidationError,
};

/// An expedition together with its current manifest.
#[derive(Debug, Clone)]
pub struct ExpeditionDetail {
    pub expedition: Expedition,
    pub lines: Vec<ManifestLine>,
}

impl ExpeditionDetail {
    /// Allocated units of a product, 0 if it is not on the manifest.
    pub fn allocated(&self, product_id: &str) -> i64 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.allocated_units)
    }
}

/// Creates, edits, cancels and closes expedition manifests.
#[derive(Debug, Clone)]
pub struct ManifestAllocator {
    db: Database,
}

impl ManifestAllocator {
    pub fn new(db: Database) -> Self {
        ManifestAllocator { db }
    }

    /// Registers an expedition in PREP. Nothing is reserved yet.
    pub async fn plan_expedition(
        &self,
        agent_id: &str,
        destination: &str,
        created_by: &str,
    ) -> DbResult<Expedition> {
        let mut tx = self.db.begin_write().await?;
        let expedition = self.insert_plan(tx.conn(), agent_id, destination, created_by).await?;
        tx.commit().await?;

        info!(expedition_id = %expedition.id, code = %expedition.code, "Expedition planned");
        Ok(expedition)
    }

    /// PREP → TRAVELING, reserving every line or none.
    pub async fn dispatch_expedition(
        &self,
        expedition_id: &str,
        lines: Vec<ManifestLineInput>,
    ) -> DbResult<ExpeditionDetail> {
        let mut tx = self.db.begin_write().await?;
        let planned = expedition::require(tx.conn(), expedition_id).await?;
        let detail = dispatch(tx.conn(), &self.db.config().calendar, &planned, &lines).await?;
        tx.commit().await?;

        info!(
            expedition_id = %expedition_id,
            lines = detail.lines.len(),
            "Expedition dispatched"
        );
        Ok(detail)
    }

    /// Plans and dispatches an expedition in one transaction.
    ///
    /// ## Errors
    /// - `DailyCapExceeded` / `InsufficientStock` for the first line that
    ///   does not fit; nothing is reserved and no expedition is created
    /// - `LineQuantityZero`, `DuplicateLine`, `ProductNotFound`
    pub async fn create_expedition(
        &self,
        agent_id: &str,
        destination: &str,
        lines: Vec<ManifestLineInput>,
        created_by: &str,
    ) -> DbResult<ExpeditionDetail> {
        let mut tx = self.db.begin_write().await?;
        let planned = self.insert_plan(tx.conn(), agent_id, destination, created_by).await?;
        let detail = dispatch(tx.conn(), &self.db.config().calendar, &planned, &lines).await?;
        tx.commit().await?;

        info!(
            expedition_id = %detail.expedition.id,
            code = %detail.expedition.code,
            lines = detail.lines.len(),
            "Expedition created"
        );
        Ok(detail)
    }

    /// Replaces the manifest of a TRAVELING expedition.
    ///
    /// Products missing from `new_lines` are dropped (their allocation is
    /// released). A line may not go below what was already sold from it.
    /// Cap checks use the expedition's departure day.
    pub async fn edit_manifest(
        &self,
        expedition_id: &str,
        new_lines: Vec<ManifestLineInput>,
    ) -> DbResult<ExpeditionDetail> {
        let calendar = self.db.config().calendar;
        let mut tx = self.db.begin_write().await?;

        let current_expedition = expedition::require(tx.conn(), expedition_id).await?;
        current_expedition.status.apply(ExpeditionAction::EditManifest)?;
        validate_manifest_lines(&new_lines)?;

        let day = calendar.local_day(current_expedition.departed_at);
        let now = Utc::now();

        let current: BTreeMap<String, ManifestLine> = expedition::fetch_manifest(tx.conn(), expedition_id)
            .await?
            .into_iter()
            .map(|l| (l.product_id.clone(), l))
            .collect();
        let sold: HashMap<String, i64> = expedition::sold_totals(tx.conn(), expedition_id)
            .await?
            .into_iter()
            .collect();
        let requested: BTreeMap<&str, i64> = new_lines
            .iter()
            .map(|l| (l.product_id.as_str(), l.total_units))
            .collect();

        let touched: BTreeSet<&str> = current
            .keys()
            .map(String::as_str)
            .chain(requested.keys().copied())
            .collect();

        for product_id in touched {
            let previous = current.get(product_id).map_or(0, |l| l.allocated_units);
            let wanted = requested.get(product_id).copied().unwrap_or(0);
            let sold_units = sold.get(product_id).copied().unwrap_or(0);

            if wanted < sold_units {
                warn!(expedition_id = %expedition_id, product_id = %product_id, sold = sold_units, wanted, "Manifest edit below sold units");
                return Err(CoreError::AllocationBelowSold {
                    product_id: product_id.to_string(),
                    sold: sold_units,
                    requested: wanted,
                }
                .into());
            }

            let delta = wanted - previous;
            if delta == 0 {
                continue;
            }

            let product = product::require(tx.conn(), product_id).await?;
            daily_cap::ensure_room(tx.conn(), &calendar, &product, day, delta).await?;
            stock_ledger::apply_delta(tx.conn(), product_id, delta).await?;

            match current.get(product_id) {
                Some(line) if wanted == 0 => expedition::delete_manifest_line(tx.conn(), &line.id).await?,
                Some(line) => expedition::update_manifest_line(tx.conn(), &line.id, wanted, now).await?,
                None => {
                    let line = ManifestLine {
                        id: generate_id(),
                        expedition_id: expedition_id.to_string(),
                        product_id: product_id.to_string(),
                        allocated_units: wanted,
                        created_at: now,
                        updated_at: now,
                    };
                    expedition::insert_manifest_line(tx.conn(), &line).await?;
                }
            }

            debug!(expedition_id = %expedition_id, product_id = %product_id, previous, wanted, delta, "Manifest line edited");
        }

        let lines = expedition::fetch_manifest(tx.conn(), expedition_id).await?;
        tx.commit().await?;

        info!(expedition_id = %expedition_id, lines = lines.len(), "Manifest edited");
        Ok(ExpeditionDetail {
            expedition: current_expedition,
            lines,
        })
    }

    /// Cancels a PREP or TRAVELING expedition.
    ///
    /// Every unit still allocated and not sold goes back on hand. Each line
    /// shrinks to its sold units, so sales made on the trip keep counting
    /// against the departure day's cap; unsold lines are deleted. A second
    /// call fails with `InvalidTransition`.
    pub async fn cancel_expedition(&self, expedition_id: &str) -> DbResult<Expedition> {
        let mut tx = self.db.begin_write().await?;
        let current = expedition::require(tx.conn(), expedition_id).await?;
        current.status.apply(ExpeditionAction::Cancel)?;

        let sold: HashMap<String, i64> = expedition::sold_totals(tx.conn(), expedition_id)
            .await?
            .into_iter()
            .collect();
        let now = Utc::now();

        let mut released = 0;
        let mut kept = 0;
        for line in expedition::fetch_manifest(tx.conn(), expedition_id).await? {
            let sold_units = sold.get(&line.product_id).copied().unwrap_or(0);
            let release = (line.allocated_units - sold_units).max(0);
            if release > 0 {
                stock_ledger::apply_delta(tx.conn(), &line.product_id, -release).await?;
                released += release;
            }

            if sold_units > 0 {
                expedition::update_manifest_line(tx.conn(), &line.id, sold_units, now).await?;
                kept += 1;
            } else {
                expedition::delete_manifest_line(tx.conn(), &line.id).await?;
            }
        }

        let cancelled = move_status(tx.conn(), &current, ExpeditionAction::Cancel).await?;
        tx.commit().await?;

        info!(expedition_id = %expedition_id, released, kept, "Expedition cancelled");
        Ok(cancelled)
    }

    /// TRAVELING → RETURNED. Stock is untouched.
    pub async fn mark_returned(&self, expedition_id: &str) -> DbResult<Expedition> {
        let mut tx = self.db.begin_write().await?;
        let current = expedition::require(tx.conn(), expedition_id).await?;
        let returned = move_status(tx.conn(), &current, ExpeditionAction::MarkReturned).await?;
        tx.commit().await?;

        info!(expedition_id = %expedition_id, "Expedition returned to warehouse");
        Ok(returned)
    }

    /// RETURNED → DONE, only once every allocated unit is sold or returned.
    pub async fn mark_done(&self, expedition_id: &str) -> DbResult<Expedition> {
        let mut tx = self.db.begin_write().await?;
        let current = expedition::require(tx.conn(), expedition_id).await?;
        current.status.apply(ExpeditionAction::MarkDone)?;

        if let Some(open) = reconcile(tx.conn(), expedition_id)
            .await?
            .into_iter()
            .find(|l| !l.is_reconciled())
        {
            warn!(expedition_id = %expedition_id, product_id = %open.product_id, outstanding = open.outstanding(), "Expedition not reconciled");
            return Err(CoreError::ManifestNotReconciled {
                outstanding: open.outstanding(),
                product_id: open.product_id,
            }
            .into());
        }

        let done = move_status(tx.conn(), &current, ExpeditionAction::MarkDone).await?;
        tx.commit().await?;

        info!(expedition_id = %expedition_id, "Expedition closed");
        Ok(done)
    }

    /// Where every allocated unit of each manifest line went.
    pub async fn reconciliation(&self, expedition_id: &str) -> DbResult<Vec<LineReconciliation>> {
        let mut conn = self.db.pool().acquire().await?;
        expedition::require(&mut conn, expedition_id).await?;
        reconcile(&mut conn, expedition_id).await
    }

    /// Gets an expedition with its manifest.
    pub async fn detail(&self, expedition_id: &str) -> DbResult<ExpeditionDetail> {
        let mut conn = self.db.pool().acquire().await?;
        let found = expedition::require(&mut conn, expedition_id).await?;
        let lines = expedition::fetch_manifest(&mut conn, expedition_id).await?;
        Ok(ExpeditionDetail {
            expedition: found,
            lines,
        })
    }

    async fn insert_plan(
        &self,
        conn: &mut SqliteConnection,
        agent_id: &str,
        destination: &str,
        created_by: &str,
    ) -> DbResult<Expedition> {
        validate_text("agent_id", agent_id)?;
        validate_text("destination", destination)?;
        validate_text("created_by", created_by)?;

        let config = self.db.config();
        let now = Utc::now();
        let planned = Expedition {
            id: generate_id(),
            code: generate_code(&config.codes.expedition_prefix, config.calendar.local_day(now)),
            agent_id: agent_id.trim().to_string(),
            destination: destination.trim().to_string(),
            status: ExpeditionStatus::Prep,
            departed_at: now,
            returned_at: None,
            created_by: created_by.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        expedition::insert(conn, &planned).await?;
        Ok(planned)
    }
}

// =============================================================================
// Shared steps
// =============================================================================

/// Moves the expedition to the status `action` leads to.
async fn move_status(
    conn: &mut SqliteConnection,
    current: &Expedition,
    action: ExpeditionAction,
) -> DbResult<Expedition> {
    let next = current.status.apply(action)?;
    let now = Utc::now();

    if !expedition::transition(conn, &current.id, current.status, next, now).await? {
        // Status changed since it was read.
        let latest = expedition::require(conn, &current.id).await?;
        return Err(CoreError::invalid_transition("Expedition", latest.status, action).into());
    }

    expedition::require(conn, &current.id).await
}

/// PREP → TRAVELING and the all-or-nothing allocation of `lines`.
async fn dispatch(
    conn: &mut SqliteConnection,
    calendar: &CalendarSettings,
    planned: &Expedition,
    lines: &[ManifestLineInput],
) -> DbResult<ExpeditionDetail> {
    planned.status.apply(ExpeditionAction::Dispatch)?;
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }
    validate_manifest_lines(lines)?;

    let traveling = move_status(conn, planned, ExpeditionAction::Dispatch).await?;
    let day = calendar.local_day(traveling.departed_at);
    let now: DateTime<Utc> = traveling.departed_at;

    let mut allocated = Vec::with_capacity(lines.len());
    for input in lines {
        let product = product::require(conn, &input.product_id).await?;
        daily_cap::ensure_room(conn, calendar, &product, day, input.total_units).await?;
        stock_ledger::apply_delta(conn, &product.id, input.total_units).await?;

        let line = ManifestLine {
            id: generate_id(),
            expedition_id: traveling.id.clone(),
            product_id: product.id.clone(),
            allocated_units: input.total_units,
            created_at: now,
            updated_at: now,
        };
        expedition::insert_manifest_line(conn, &line).await?;
        debug!(expedition_id = %traveling.id, product_id = %product.id, units = input.total_units, "Manifest line allocated");
        allocated.push(line);
    }

    allocated.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    Ok(ExpeditionDetail {
        expedition: traveling,
        lines: allocated,
    })
}

/// Builds the reconciliation report of an expedition's manifest.
pub(crate) async fn reconcile(
    conn: &mut SqliteConnection,
    expedition_id: &str,
) -> DbResult<Vec<LineReconciliation>> {
    let manifest = expedition::fetch_manifest(conn, expedition_id).await?;
    let sold: HashMap<String, i64> = expedition::sold_totals(conn, expedition_id)
        .await?
        .into_iter()
        .collect();
    let returned = expedition::returned_totals(conn, expedition_id).await?;

    let report = manifest
        .into_iter()
        .map(|line| {
            let mut entry = LineReconciliation {
                sold: sold.get(&line.product_id).copied().unwrap_or(0),
                allocated: line.allocated_units,
                product_id: line.product_id,
                returned_good: 0,
                returned_damaged: 0,
                returned_expired: 0,
            };
            for (product_id, condition, units) in &returned {
                if *product_id != entry.product_id {
                    continue;
                }
                match condition {
                    ReturnCondition::Good => entry.returned_good += units,
                    ReturnCondition::Damaged => entry.returned_damaged += units,
                    ReturnCondition::Expired => entry.returned_expired += units,
                }
            }
            entry
        })
        .collect();

    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{capped_product, memory_db, on_hand, product};
    use kanvas_core::Headroom;

    fn line(product_id: &str, units: i64) -> ManifestLineInput {
        ManifestLineInput::new(product_id, units)
    }

    #[tokio::test]
    async fn test_scenario_a_daily_cap_shared_between_manifests() {
        let db = memory_db().await;
        let p = capped_product(&db).await;
        let manifests = db.manifests();

        let first = manifests
            .create_expedition("agent-1", "Bogor", vec![ManifestLineInput::from_packages(&p.id, 8, 0, 12)], "admin")
            .await
            .unwrap();
        assert_eq!(first.expedition.status, ExpeditionStatus::Traveling);
        assert_eq!(first.allocated(&p.id), 96);
        assert_eq!(on_hand(&db, &p.id).await, 404);

        let today = db.config().calendar.today();
        assert_eq!(db.daily_cap().headroom(&p.id, today).await.unwrap(), Headroom::Remaining(4));

        let err = manifests
            .create_expedition("agent-2", "Depok", vec![line(&p.id, 12)], "admin")
            .await
            .unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::DailyCapExceeded { remaining_units: 4, remaining_packages: 0, .. })
        ));
        assert_eq!(on_hand(&db, &p.id).await, 404);

        // The refused expedition was not created either.
        let traveling = db
            .expeditions()
            .list_by_status(ExpeditionStatus::Traveling, 10)
            .await
            .unwrap();
        assert_eq!(traveling.len(), 1);
        assert!(db
            .expeditions()
            .list_by_status(ExpeditionStatus::Prep, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_scenario_b_edits_apply_deltas() {
        let db = memory_db().await;
        let p = product(&db, "B", 12, 500, 10_000).await;
        let manifests = db.manifests();

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&p.id, 50)], "admin")
            .await
            .unwrap();
        let id = detail.expedition.id;
        assert_eq!(on_hand(&db, &p.id).await, 450);

        let shrunk = manifests.edit_manifest(&id, vec![line(&p.id, 30)]).await.unwrap();
        assert_eq!(shrunk.allocated(&p.id), 30);
        assert_eq!(on_hand(&db, &p.id).await, 470);

        let grown = manifests.edit_manifest(&id, vec![line(&p.id, 80)]).await.unwrap();
        assert_eq!(grown.allocated(&p.id), 80);
        assert_eq!(on_hand(&db, &p.id).await, 420);
    }

    #[tokio::test]
    async fn test_edit_path_independence() {
        let via = memory_db().await;
        let direct = memory_db().await;

        for (db, path) in [(&via, vec![70, 10, 40]), (&direct, vec![40])] {
            let p = product(db, "P", 6, 300, 1_000).await;
            let manifests = db.manifests();
            let detail = manifests
                .create_expedition("agent-1", "Bogor", vec![line(&p.id, 25)], "admin")
                .await
                .unwrap();

            for units in path {
                manifests
                    .edit_manifest(&detail.expedition.id, vec![line(&p.id, units)])
                    .await
                    .unwrap();
            }

            let after = manifests.detail(&detail.expedition.id).await.unwrap();
            assert_eq!(after.allocated(&p.id), 40);
            assert_eq!(on_hand(db, &p.id).await, 260);
        }
    }

    #[tokio::test]
    async fn test_edit_adds_and_drops_lines() {
        let db = memory_db().await;
        let a = product(&db, "A", 6, 100, 1_000).await;
        let b = product(&db, "B", 6, 100, 1_000).await;
        let manifests = db.manifests();

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&a.id, 20)], "admin")
            .await
            .unwrap();

        let edited = manifests
            .edit_manifest(&detail.expedition.id, vec![line(&b.id, 15)])
            .await
            .unwrap();
        assert_eq!(edited.lines.len(), 1);
        assert_eq!(edited.allocated(&a.id), 0);
        assert_eq!(edited.allocated(&b.id), 15);
        assert_eq!(on_hand(&db, &a.id).await, 100);
        assert_eq!(on_hand(&db, &b.id).await, 85);
    }

    #[tokio::test]
    async fn test_edit_is_all_or_nothing() {
        let db = memory_db().await;
        let a = product(&db, "A", 6, 100, 1_000).await;
        let b = product(&db, "B", 6, 10, 1_000).await;
        let manifests = db.manifests();

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&a.id, 20), line(&b.id, 5)], "admin")
            .await
            .unwrap();

        // A grows fine, B cannot: nothing may change.
        let err = manifests
            .edit_manifest(&detail.expedition.id, vec![line(&a.id, 60), line(&b.id, 50)])
            .await
            .unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::InsufficientStock { available: 5, requested: 45, .. })
        ));

        let after = manifests.detail(&detail.expedition.id).await.unwrap();
        assert_eq!(after.allocated(&a.id), 20);
        assert_eq!(after.allocated(&b.id), 5);
        assert_eq!(on_hand(&db, &a.id).await, 80);
        assert_eq!(on_hand(&db, &b.id).await, 5);
    }

    #[tokio::test]
    async fn test_create_is_all_or_nothing() {
        let db = memory_db().await;
        let a = product(&db, "A", 6, 100, 1_000).await;
        let b = product(&db, "B", 6, 10, 1_000).await;

        let err = db
            .manifests()
            .create_expedition("agent-1", "Bogor", vec![line(&a.id, 30), line(&b.id, 11)], "admin")
            .await
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InsufficientStock { .. })));
        assert_eq!(on_hand(&db, &a.id).await, 100);
        assert_eq!(on_hand(&db, &b.id).await, 10);
    }

    #[tokio::test]
    async fn test_shrinking_allowed_when_cap_exhausted() {
        let db = memory_db().await;
        let p = capped_product(&db).await;
        let manifests = db.manifests();

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&p.id, 100)], "admin")
            .await
            .unwrap();

        manifests
            .edit_manifest(&detail.expedition.id, vec![line(&p.id, 90)])
            .await
            .unwrap();

        // Growing back up to the cap is fine, past it is not.
        manifests
            .edit_manifest(&detail.expedition.id, vec![line(&p.id, 100)])
            .await
            .unwrap();
        let err = manifests
            .edit_manifest(&detail.expedition.id, vec![line(&p.id, 101)])
            .await
            .unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::DailyCapExceeded { remaining_units: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_later_edit_is_charged_to_departure_day() {
        let db = memory_db().await;
        let p = capped_product(&db).await;
        let manifests = db.manifests();
        let today = db.config().calendar.today();

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&p.id, 60)], "admin")
            .await
            .unwrap();
        let id = detail.expedition.id.as_str();

        sqlx::query("UPDATE expeditions SET departed_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - chrono::Duration::days(1))
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();
        let yesterday = today.pred_opt().unwrap();
        assert_eq!(db.daily_cap().committed(&p.id, today).await.unwrap(), 0);
        assert_eq!(db.daily_cap().committed(&p.id, yesterday).await.unwrap(), 60);

        manifests.edit_manifest(id, vec![line(&p.id, 100)]).await.unwrap();
        assert_eq!(db.daily_cap().committed(&p.id, yesterday).await.unwrap(), 100);
        assert_eq!(db.daily_cap().committed(&p.id, today).await.unwrap(), 0);

        // Today's headroom is untouched, the departure day is full.
        let err = manifests.edit_manifest(id, vec![line(&p.id, 101)]).await.unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::DailyCapExceeded { remaining_units: 0, .. })
        ));
        assert_eq!(db.daily_cap().headroom(&p.id, today).await.unwrap(), Headroom::Remaining(100));
    }

    #[tokio::test]
    async fn test_zero_line_rejected() {
        let db = memory_db().await;
        let p = product(&db, "A", 6, 100, 1_000).await;
        let manifests = db.manifests();

        let err = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&p.id, 0)], "admin")
            .await
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::LineQuantityZero { .. })));

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&p.id, 10)], "admin")
            .await
            .unwrap();
        let err = manifests
            .edit_manifest(&detail.expedition.id, vec![line(&p.id, 0)])
            .await
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::LineQuantityZero { .. })));
    }

    #[tokio::test]
    async fn test_cancel_round_trip_and_guard() {
        let db = memory_db().await;
        let a = product(&db, "A", 6, 100, 1_000).await;
        let b = capped_product(&db).await;
        let manifests = db.manifests();

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&a.id, 33), line(&b.id, 96)], "admin")
            .await
            .unwrap();
        manifests
            .edit_manifest(&detail.expedition.id, vec![line(&a.id, 40), line(&b.id, 50)])
            .await
            .unwrap();

        let cancelled = manifests.cancel_expedition(&detail.expedition.id).await.unwrap();
        assert_eq!(cancelled.status, ExpeditionStatus::Cancelled);
        assert_eq!(on_hand(&db, &a.id).await, 100);
        assert_eq!(on_hand(&db, &b.id).await, 500);
        assert!(manifests.detail(&cancelled.id).await.unwrap().lines.is_empty());

        let err = manifests.cancel_expedition(&cancelled.id).await.unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidTransition { .. })));
        assert_eq!(on_hand(&db, &a.id).await, 100);
    }

    #[tokio::test]
    async fn test_plan_then_dispatch() {
        let db = memory_db().await;
        let p = product(&db, "A", 6, 100, 1_000).await;
        let manifests = db.manifests();

        let planned = manifests.plan_expedition("agent-1", "Sukabumi", "admin").await.unwrap();
        assert_eq!(planned.status, ExpeditionStatus::Prep);
        assert!(planned.code.starts_with("EXP-"));
        assert_eq!(on_hand(&db, &p.id).await, 100);

        // Nothing to edit or return before departure.
        assert!(manifests.edit_manifest(&planned.id, vec![line(&p.id, 5)]).await.is_err());
        assert!(manifests.mark_returned(&planned.id).await.is_err());

        let dispatched = manifests
            .dispatch_expedition(&planned.id, vec![line(&p.id, 12)])
            .await
            .unwrap();
        assert_eq!(dispatched.expedition.status, ExpeditionStatus::Traveling);
        assert_eq!(on_hand(&db, &p.id).await, 88);

        let err = manifests
            .dispatch_expedition(&planned.id, vec![line(&p.id, 12)])
            .await
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidTransition { .. })));
        assert_eq!(on_hand(&db, &p.id).await, 88);
    }

    #[tokio::test]
    async fn test_cancel_from_prep() {
        let db = memory_db().await;
        let planned = db.manifests().plan_expedition("agent-1", "Sukabumi", "admin").await.unwrap();
        let cancelled = db.manifests().cancel_expedition(&planned.id).await.unwrap();
        assert_eq!(cancelled.status, ExpeditionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_uneventful_trip_cannot_close_with_goods_outstanding() {
        let db = memory_db().await;
        let p = product(&db, "A", 6, 100, 1_000).await;
        let manifests = db.manifests();

        let detail = manifests
            .create_expedition("agent-1", "Bogor", vec![line(&p.id, 10)], "admin")
            .await
            .unwrap();
        let id = detail.expedition.id;

        assert!(manifests.mark_done(&id).await.is_err());
        let returned = manifests.mark_returned(&id).await.unwrap();
        assert_eq!(returned.status, ExpeditionStatus::Returned);
        assert!(returned.returned_at.is_some());
        assert!(manifests.cancel_expedition(&id).await.is_err());

        let err = manifests.mark_done(&id).await.unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::ManifestNotReconciled { outstanding: 10, .. })
        ));

        let report = manifests.reconciliation(&id).await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].outstanding(), 10);
    }

    #[tokio::test]
    async fn test_on_hand_never_negative() {
        let db = memory_db().await;
        let p = product(&db, "A", 6, 50, 1_000).await;
        let manifests = db.manifests();

        let mut open = Vec::new();
        for units in [30, 30, 15, 10, 60, 5] {
            if let Ok(detail) = manifests
                .create_expedition("agent-1", "Bogor", vec![line(&p.id, units)], "admin")
                .await
            {
                open.push(detail.expedition.id);
            }
            assert!(on_hand(&db, &p.id).await >= 0);
        }

        for (i, id) in open.iter().enumerate() {
            let _ = manifests.edit_manifest(id, vec![line(&p.id, 7 * (i as i64 + 1))]).await;
            assert!(on_hand(&db, &p.id).await >= 0);
        }

        for id in &open {
            manifests.cancel_expedition(id).await.unwrap();
        }
        assert_eq!(on_hand(&db, &p.id).await, 50);
    }
}
