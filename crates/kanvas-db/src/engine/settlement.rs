//! # Order Settlement Engine
//!
//! Takes a sale order from cart to settled, moving stock exactly once.
//!
//! ## Approval Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  approve(order, final_lines, payment)          one ledger transaction   │
//! │                                                                         │
//! │  1. PENDING/CART ──► APPROVED/COMPLETE allowed?                         │
//! │  2. final lines: non-empty, no zero quantity                            │
//! │  3. totals recomputed from the final lines (never from the cart)       │
//! │  4. payment assessed; walk-in shortfall always refused                  │
//! │  5. stock drawn                                                         │
//! │       direct order     ──► daily cap + on_hand                          │
//! │       expedition order ──► manifest pool (allocated − sold − returned)  │
//! │  6. lines + snapshot written, status guarded on PENDING                 │
//! │  7. ORDER_APPROVED (+ DEBT_RECORDED) queued in the outbox              │
//! │                                                                         │
//! │  Any failure drops the transaction: no stock moves, order stays PENDING│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info, warn};

use crate::config::CalendarSettings;
use crate::engine::{daily_cap, manifest, stock_ledger};
use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::outbox;
use crate::repository::{expedition, generate_code, generate_id, order, product};
use kanvas_core::validation::{
    validate_amount, validate_final_order_lines, validate_order_lines, validate_text,
};
use kanvas_core::{
    compute_totals, validate_payment, ApprovalStatus, CoreError, DebtRecorded, ExpeditionStatus,
    Money, OrderAction, OrderLineInput, OrderState, OrderTotals, PaymentAssessment, PaymentInput,
    PricedLine, SaleOrder, SaleOrderLine, SettlementEventType, TransactionStatus,
};

/// A sale order still in the cart, with its lines.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub order: SaleOrder,
    pub lines: Vec<SaleOrderLine>,
}

/// Read-only preview of what approving an order would charge.
#[derive(Debug, Clone, Copy)]
pub struct OrderQuote {
    pub totals: OrderTotals,
    pub payment: PaymentAssessment,
}

/// Result of a successful approval.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub order: SaleOrder,
    pub lines: Vec<SaleOrderLine>,
    pub totals: OrderTotals,
    pub payment: PaymentAssessment,
}

/// Creates, edits, approves and rejects sale orders.
#[derive(Debug, Clone)]
pub struct OrderSettlementEngine {
    db: Database,
}

impl OrderSettlementEngine {
    pub fn new(db: Database) -> Self {
        OrderSettlementEngine { db }
    }

    /// Opens a sale order in PENDING/CART. No stock moves.
    ///
    /// `customer_ref` is `None` for walk-in customers; `expedition_id` is set
    /// when an agent sells from an expedition's manifest.
    pub async fn create_pending_order(
        &self,
        customer_ref: Option<&str>,
        expedition_id: Option<&str>,
        lines: Vec<OrderLineInput>,
        discount_on_total: i64,
        created_by: &str,
    ) -> DbResult<PendingOrder> {
        validate_text("created_by", created_by)?;
        if let Some(customer) = customer_ref {
            validate_text("customer_ref", customer)?;
        }
        validate_amount("discount_on_total", discount_on_total)?;
        validate_order_lines(&lines)?;

        let config = self.db.config();
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        if let Some(expedition_id) = expedition_id {
            let source = expedition::require(tx.conn(), expedition_id).await?;
            ensure_selling(source.status)?;
        }

        let created = SaleOrder {
            id: generate_id(),
            code: generate_code(&config.codes.order_prefix, config.calendar.local_day(now)),
            customer_ref: customer_ref.map(|c| c.trim().to_string()),
            expedition_id: expedition_id.map(str::to_string),
            approval_status: ApprovalStatus::Pending,
            transaction_status: TransactionStatus::Cart,
            discount_on_total,
            payment_method: None,
            amount_paid: 0,
            cash_portion: 0,
            transfer_portion: 0,
            subtotal: 0,
            total: 0,
            change_due: 0,
            debt_remaining: 0,
            created_by: created_by.trim().to_string(),
            decided_by: None,
            created_at: now,
            updated_at: now,
            decided_at: None,
        };
        order::insert(tx.conn(), &created).await?;

        let order_lines = build_lines(tx.conn(), &created.id, &lines, now).await?;
        order::replace_lines(tx.conn(), &created.id, &order_lines).await?;
        tx.commit().await?;

        info!(order_id = %created.id, code = %created.code, lines = order_lines.len(), "Sale order opened");
        Ok(PendingOrder {
            order: created,
            lines: order_lines,
        })
    }

    /// Replaces the lines and order-level discount of a pending order.
    ///
    /// Zero-quantity lines are kept here; approval refuses them.
    pub async fn edit_pending_order(
        &self,
        order_id: &str,
        lines: Vec<OrderLineInput>,
        discount_on_total: i64,
    ) -> DbResult<PendingOrder> {
        validate_amount("discount_on_total", discount_on_total)?;
        validate_order_lines(&lines)?;

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let current = order::require(tx.conn(), order_id).await?;
        order_state(&current).apply(OrderAction::Edit)?;

        let order_lines = build_lines(tx.conn(), order_id, &lines, now).await?;
        order::replace_lines(tx.conn(), order_id, &order_lines).await?;
        if !order::update_draft(tx.conn(), order_id, discount_on_total, now).await? {
            return Err(CoreError::invalid_transition("Sale order", current.approval_status, OrderAction::Edit).into());
        }

        let edited = order::require(tx.conn(), order_id).await?;
        tx.commit().await?;

        debug!(order_id = %order_id, lines = order_lines.len(), "Sale order edited");
        Ok(PendingOrder {
            order: edited,
            lines: order_lines,
        })
    }

    /// Prices the stored lines and assesses a payment without writing anything.
    pub async fn quote(&self, order_id: &str, payment: &PaymentInput) -> DbResult<OrderQuote> {
        let mut conn = self.db.pool().acquire().await?;
        let current = order::require(&mut conn, order_id).await?;
        let lines = order::fetch_lines(&mut conn, order_id).await?;

        let totals = price(&lines, current.discount_on_total);
        let payment = validate_payment(totals.total, payment, current.customer_ref.is_some())?;

        Ok(OrderQuote { totals, payment })
    }

    /// Approves an order with its final lines and the payment received.
    ///
    /// ## Errors
    /// - `InvalidTransition` unless the order is PENDING
    /// - `LineQuantityZero` / validation errors for the final lines
    /// - `UnregisteredCustomerDebtNotAllowed` for a walk-in shortfall
    /// - `PaymentBelowTotal` for a registered shortfall when debt is disabled
    /// - `DailyCapExceeded` / `InsufficientStock` for direct orders
    /// - `InsufficientStock` / `NotOnManifest` for expedition orders
    pub async fn approve(
        &self,
        order_id: &str,
        final_lines: Vec<OrderLineInput>,
        payment: PaymentInput,
        decided_by: &str,
    ) -> DbResult<Settlement> {
        validate_text("decided_by", decided_by)?;
        validate_final_order_lines(&final_lines)?;

        let config = self.db.config();
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let current = order::require(tx.conn(), order_id).await?;
        let next = order_state(&current).apply(OrderAction::Approve)?;

        let lines = build_lines(tx.conn(), order_id, &final_lines, now).await?;
        let totals = price(&lines, current.discount_on_total);

        let assessment = validate_payment(totals.total, &payment, current.customer_ref.is_some())?;
        if let Err(err) = assessment.ensure_settleable(config.settlement.allow_registered_debt) {
            warn!(
                order_id = %order_id,
                total = %totals.total,
                paid = %assessment.paid,
                walk_in = current.is_walk_in(),
                "Payment refused"
            );
            return Err(err.into());
        }

        match current.expedition_id.as_deref() {
            Some(expedition_id) => draw_from_manifest(tx.conn(), expedition_id, &lines).await?,
            None => {
                let day = config.calendar.local_day(now);
                draw_from_warehouse(tx.conn(), &config.calendar, day, &lines).await?
            }
        }

        order::replace_lines(tx.conn(), order_id, &lines).await?;

        let settled = SaleOrder {
            approval_status: next.approval,
            transaction_status: next.transaction,
            payment_method: Some(assessment.method),
            amount_paid: assessment.paid.minor(),
            cash_portion: assessment.cash_portion.minor(),
            transfer_portion: assessment.transfer_portion.minor(),
            subtotal: totals.subtotal.minor(),
            total: totals.total.minor(),
            change_due: assessment.change.minor(),
            debt_remaining: assessment.debt_remaining.minor(),
            decided_by: Some(decided_by.trim().to_string()),
            decided_at: Some(now),
            updated_at: now,
            ..current
        };
        if !order::record_decision(tx.conn(), &settled).await? {
            return Err(CoreError::invalid_transition("Sale order", settled.approval_status, OrderAction::Approve).into());
        }

        let snapshot = serde_json::to_string(&settled)?;
        outbox::enqueue(tx.conn(), SettlementEventType::OrderApproved, &settled.id, &snapshot).await?;

        if let Some(customer_ref) = settled.customer_ref.as_deref() {
            if settled.debt_remaining > 0 {
                let event = DebtRecorded {
                    order_id: settled.id.clone(),
                    customer_ref: customer_ref.to_string(),
                    debt_remaining: settled.debt_remaining,
                };
                let payload = serde_json::to_string(&event)?;
                outbox::enqueue(tx.conn(), SettlementEventType::DebtRecorded, &settled.id, &payload).await?;
            }
        }

        tx.commit().await?;

        info!(
            order_id = %settled.id,
            code = %settled.code,
            total = settled.total,
            paid = settled.amount_paid,
            debt = settled.debt_remaining,
            expedition_id = ?settled.expedition_id,
            "Sale order approved"
        );

        Ok(Settlement {
            order: settled,
            lines,
            totals,
            payment: assessment,
        })
    }

    /// Rejects a pending order. No stock moves.
    pub async fn reject(&self, order_id: &str, decided_by: &str) -> DbResult<SaleOrder> {
        validate_text("decided_by", decided_by)?;

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let current = order::require(tx.conn(), order_id).await?;
        let next = order_state(&current).apply(OrderAction::Reject)?;

        let rejected = SaleOrder {
            approval_status: next.approval,
            transaction_status: next.transaction,
            decided_by: Some(decided_by.trim().to_string()),
            decided_at: Some(now),
            updated_at: now,
            ..current
        };
        if !order::record_decision(tx.conn(), &rejected).await? {
            return Err(CoreError::invalid_transition("Sale order", rejected.approval_status, OrderAction::Reject).into());
        }
        tx.commit().await?;

        info!(order_id = %order_id, "Sale order rejected");
        Ok(rejected)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn order_state(order: &SaleOrder) -> OrderState {
    OrderState::new(order.approval_status, order.transaction_status)
}

/// Agents sell from a manifest while travelling and settle late sales after return.
fn ensure_selling(status: ExpeditionStatus) -> DbResult<()> {
    match status {
        ExpeditionStatus::Traveling | ExpeditionStatus::Returned => Ok(()),
        other => Err(CoreError::invalid_transition("Expedition", other, "sell from manifest").into()),
    }
}

fn price(lines: &[SaleOrderLine], discount_on_total: i64) -> OrderTotals {
    let priced: Vec<PricedLine> = lines.iter().map(PricedLine::from).collect();
    compute_totals(&priced, Money::from_minor(discount_on_total))
}

/// Turns inputs into order lines, snapshotting each product's package size.
async fn build_lines(
    conn: &mut SqliteConnection,
    order_id: &str,
    inputs: &[OrderLineInput],
    now: DateTime<Utc>,
) -> DbResult<Vec<SaleOrderLine>> {
    let mut lines = Vec::with_capacity(inputs.len());

    for input in inputs {
        let item = product::require(conn, &input.product_id).await?;
        lines.push(SaleOrderLine {
            id: generate_id(),
            order_id: order_id.to_string(),
            product_id: item.id,
            quantity_units: input.quantity_units,
            units_per_package: item.units_per_package,
            unit_package_price: input.unit_package_price,
            discount_per_package: input.discount_per_package,
            created_at: now,
        });
    }

    lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    Ok(lines)
}

/// Direct sale: every line passes the daily cap, then leaves the warehouse.
async fn draw_from_warehouse(
    conn: &mut SqliteConnection,
    calendar: &CalendarSettings,
    day: NaiveDate,
    lines: &[SaleOrderLine],
) -> DbResult<()> {
    for line in lines {
        let item = product::require(conn, &line.product_id).await?;
        daily_cap::ensure_room(conn, calendar, &item, day, line.quantity_units).await?;
        stock_ledger::apply_delta(conn, &line.product_id, line.quantity_units).await?;
    }

    Ok(())
}

/// Expedition sale: the goods already left the warehouse with the manifest,
/// so only the expedition's unsold, unreturned pool is checked.
async fn draw_from_manifest(
    conn: &mut SqliteConnection,
    expedition_id: &str,
    lines: &[SaleOrderLine],
) -> DbResult<()> {
    let source = expedition::require(conn, expedition_id).await?;
    ensure_selling(source.status)?;

    let pool: HashMap<String, i64> = manifest::reconcile(conn, expedition_id)
        .await?
        .into_iter()
        .map(|l| (l.product_id.clone(), l.outstanding()))
        .collect();

    for line in lines {
        let Some(&available) = pool.get(&line.product_id) else {
            return Err(CoreError::NotOnManifest {
                expedition_id: expedition_id.to_string(),
                product_id: line.product_id.clone(),
            }
            .into());
        };

        if line.quantity_units > available {
            warn!(expedition_id = %expedition_id, product_id = %line.product_id, available, requested = line.quantity_units, "Manifest pool exhausted");
            return Err(CoreError::InsufficientStock {
                product_id: line.product_id.clone(),
                available,
                requested: line.quantity_units,
            }
            .into());
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
