//! # Sale Order Repository
//!
//! Database operations for sale orders and their lines.
//!
//! ## Order Lifecycle in Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. CREATE (PENDING/CART)                                              │
//! │     INSERT INTO sale_orders, totals all zero                           │
//! │     INSERT INTO sale_order_lines (unit_per_package snapshot)           │
//! │                                                                         │
//! │  2. EDIT (still PENDING)                                               │
//! │     DELETE + INSERT sale_order_lines, UPDATE discount_on_total         │
//! │                                                                         │
//! │  3. APPROVE / REJECT                                                   │
//! │     UPDATE sale_orders ... WHERE id = ? AND approval_status = 'PENDING'│
//! │     (the guard makes a second decision a no-op that the engine         │
//! │      reports as InvalidTransition)                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use kanvas_core::{ApprovalStatus, CoreError, SaleOrder, SaleOrderLine};

const ORDER_COLUMNS: &str = "id, code, customer_ref, expedition_id, approval_status, transaction_status, \
     discount_on_total, payment_method, amount_paid, cash_portion, transfer_portion, subtotal, total, \
     change_due, debt_remaining, created_by, decided_by, created_at, updated_at, decided_at";

const LINE_COLUMNS: &str = "id, order_id, product_id, quantity_units, units_per_package, \
     unit_package_price, discount_per_package, created_at";

/// Repository for sale order reads.
///
/// Writes go through [`OrderSettlementEngine`](crate::engine::OrderSettlementEngine).
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleOrder>> {
        debug!(id = %id, "Getting sale order by ID");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets an order by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<SaleOrder>> {
        debug!(code = %code, "Getting sale order by code");

        let order = sqlx::query_as::<_, SaleOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM sale_orders WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets the lines of an order.
    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<SaleOrderLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_lines(&mut conn, order_id).await
    }

    /// Lists orders awaiting a decision, oldest first.
    pub async fn list_pending(&self, limit: u32) -> DbResult<Vec<SaleOrder>> {
        debug!(limit = %limit, "Listing pending orders");

        let orders = sqlx::query_as::<_, SaleOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM sale_orders WHERE approval_status = 'PENDING' \
             ORDER BY created_at ASC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

// =============================================================================
// Connection-level queries (shared with the engine)
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SaleOrder>> {
    let order = sqlx::query_as::<_, SaleOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM sale_orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Fetches an order or fails with `OrderNotFound`.
pub(crate) async fn require(conn: &mut SqliteConnection, id: &str) -> DbResult<SaleOrder> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(id.to_string()).into())
}

pub(crate) async fn insert(conn: &mut SqliteConnection, order: &SaleOrder) -> DbResult<()> {
    debug!(id = %order.id, code = %order.code, "Inserting sale order");

    sqlx::query(
        r#"
        INSERT INTO sale_orders (
            id, code, customer_ref, expedition_id, approval_status, transaction_status,
            discount_on_total, payment_method, amount_paid, cash_portion, transfer_portion,
            subtotal, total, change_due, debt_remaining,
            created_by, decided_by, created_at, updated_at, decided_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.code)
    .bind(&order.customer_ref)
    .bind(&order.expedition_id)
    .bind(order.approval_status)
    .bind(order.transaction_status)
    .bind(order.discount_on_total)
    .bind(order.payment_method)
    .bind(order.amount_paid)
    .bind(order.cash_portion)
    .bind(order.transfer_portion)
    .bind(order.subtotal)
    .bind(order.total)
    .bind(order.change_due)
    .bind(order.debt_remaining)
    .bind(&order.created_by)
    .bind(&order.decided_by)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.decided_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<SaleOrderLine>> {
    debug!(order_id = %order_id, "Getting sale order lines");

    let lines = sqlx::query_as::<_, SaleOrderLine>(&format!(
        "SELECT {LINE_COLUMNS} FROM sale_order_lines WHERE order_id = ?1 ORDER BY product_id ASC"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Replaces every line of an order.
pub(crate) async fn replace_lines(
    conn: &mut SqliteConnection,
    order_id: &str,
    lines: &[SaleOrderLine],
) -> DbResult<()> {
    debug!(order_id = %order_id, count = lines.len(), "Replacing sale order lines");

    sqlx::query("DELETE FROM sale_order_lines WHERE order_id = ?1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO sale_order_lines (
                id, order_id, product_id, quantity_units, units_per_package,
                unit_package_price, discount_per_package, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(&line.product_id)
        .bind(line.quantity_units)
        .bind(line.units_per_package)
        .bind(line.unit_package_price)
        .bind(line.discount_per_package)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Updates the editable header fields of a pending order.
pub(crate) async fn update_draft(
    conn: &mut SqliteConnection,
    order_id: &str,
    discount_on_total: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sale_orders SET discount_on_total = ?2, updated_at = ?3
        WHERE id = ?1 AND approval_status = 'PENDING'
        "#,
    )
    .bind(order_id)
    .bind(discount_on_total)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Writes the decision (and, for approvals, the settlement snapshot).
///
/// Returns false if the order was no longer PENDING.
pub(crate) async fn record_decision(conn: &mut SqliteConnection, order: &SaleOrder) -> DbResult<bool> {
    debug!(
        id = %order.id,
        approval_status = %order.approval_status,
        "Recording sale order decision"
    );

    let result = sqlx::query(
        r#"
        UPDATE sale_orders SET
            approval_status = ?2,
            transaction_status = ?3,
            payment_method = ?4,
            amount_paid = ?5,
            cash_portion = ?6,
            transfer_portion = ?7,
            subtotal = ?8,
            total = ?9,
            change_due = ?10,
            debt_remaining = ?11,
            decided_by = ?12,
            decided_at = ?13,
            updated_at = ?13
        WHERE id = ?1 AND approval_status = ?14
        "#,
    )
    .bind(&order.id)
    .bind(order.approval_status)
    .bind(order.transaction_status)
    .bind(order.payment_method)
    .bind(order.amount_paid)
    .bind(order.cash_portion)
    .bind(order.transfer_portion)
    .bind(order.subtotal)
    .bind(order.total)
    .bind(order.change_due)
    .bind(order.debt_remaining)
    .bind(&order.decided_by)
    .bind(order.decided_at)
    .bind(ApprovalStatus::Pending)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
