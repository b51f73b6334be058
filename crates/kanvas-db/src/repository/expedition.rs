//! # Expedition Repository
//!
//! Expeditions, their manifest lines and their return lines.
//!
//! ## Tables
//! ```text
//! ┌────────────────┐ 1   * ┌──────────────────┐
//! │  expeditions   │──────►│  manifest_lines  │  one row per (expedition, product)
//! │  status        │       │  allocated_units │
//! │  departed_at   │       └──────────────────┘
//! │                │ 1   * ┌──────────────────┐
//! │                │──────►│  return_lines    │  append-only audit
//! └────────────────┘       │  condition       │
//!                          └──────────────────┘
//! ```
//!
//! Status changes are guarded: `UPDATE ... WHERE id = ? AND status = ?`.
//! A zero row count means someone else moved the expedition first.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use kanvas_core::{CoreError, Expedition, ExpeditionStatus, ManifestLine, ReturnCondition, ReturnLine};

const EXPEDITION_COLUMNS: &str = "id, code, agent_id, destination, status, departed_at, returned_at, \
     created_by, created_at, updated_at";

const MANIFEST_COLUMNS: &str = "id, expedition_id, product_id, allocated_units, created_at, updated_at";

const RETURN_COLUMNS: &str =
    "id, expedition_id, product_id, returned_units, condition, note, recorded_by, created_at";

/// Repository for expedition reads.
///
/// Writes go through [`ManifestAllocator`](crate::engine::ManifestAllocator)
/// and [`ReturnReconciler`](crate::engine::ReturnReconciler).
#[derive(Debug, Clone)]
pub struct ExpeditionRepository {
    pool: SqlitePool,
}

impl ExpeditionRepository {
    /// Creates a new ExpeditionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpeditionRepository { pool }
    }

    /// Gets an expedition by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Expedition>> {
        debug!(id = %id, "Getting expedition by ID");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets an expedition by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Expedition>> {
        debug!(code = %code, "Getting expedition by code");

        let expedition = sqlx::query_as::<_, Expedition>(&format!(
            "SELECT {EXPEDITION_COLUMNS} FROM expeditions WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expedition)
    }

    /// Lists expeditions in a status, most recent departure first.
    pub async fn list_by_status(&self, status: ExpeditionStatus, limit: u32) -> DbResult<Vec<Expedition>> {
        debug!(status = %status, limit = %limit, "Listing expeditions");

        let expeditions = sqlx::query_as::<_, Expedition>(&format!(
            "SELECT {EXPEDITION_COLUMNS} FROM expeditions WHERE status = ?1 \
             ORDER BY departed_at DESC LIMIT ?2"
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(expeditions)
    }

    /// Gets the manifest of an expedition.
    pub async fn manifest_lines(&self, expedition_id: &str) -> DbResult<Vec<ManifestLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_manifest(&mut conn, expedition_id).await
    }

    /// Gets every return recorded against an expedition, oldest first.
    pub async fn return_lines(&self, expedition_id: &str) -> DbResult<Vec<ReturnLine>> {
        debug!(expedition_id = %expedition_id, "Getting return lines");

        let lines = sqlx::query_as::<_, ReturnLine>(&format!(
            "SELECT {RETURN_COLUMNS} FROM return_lines WHERE expedition_id = ?1 ORDER BY created_at ASC"
        ))
        .bind(expedition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

// =============================================================================
// Expedition rows
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Expedition>> {
    let expedition = sqlx::query_as::<_, Expedition>(&format!(
        "SELECT {EXPEDITION_COLUMNS} FROM expeditions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(expedition)
}

/// Fetches an expedition or fails with `ExpeditionNotFound`.
pub(crate) async fn require(conn: &mut SqliteConnection, id: &str) -> DbResult<Expedition> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::ExpeditionNotFound(id.to_string()).into())
}

pub(crate) async fn insert(conn: &mut SqliteConnection, expedition: &Expedition) -> DbResult<()> {
    debug!(id = %expedition.id, code = %expedition.code, "Inserting expedition");

    sqlx::query(
        r#"
        INSERT INTO expeditions (
            id, code, agent_id, destination, status,
            departed_at, returned_at, created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&expedition.id)
    .bind(&expedition.code)
    .bind(&expedition.agent_id)
    .bind(&expedition.destination)
    .bind(expedition.status)
    .bind(expedition.departed_at)
    .bind(expedition.returned_at)
    .bind(&expedition.created_by)
    .bind(expedition.created_at)
    .bind(expedition.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Moves an expedition from `from` to `to`. Returns false if it was not in `from`.
pub(crate) async fn transition(
    conn: &mut SqliteConnection,
    id: &str,
    from: ExpeditionStatus,
    to: ExpeditionStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id = %id, from = %from, to = %to, "Updating expedition status");

    let result = sqlx::query(
        r#"
        UPDATE expeditions SET
            status = ?3,
            departed_at = CASE WHEN ?3 = 'TRAVELING' THEN ?4 ELSE departed_at END,
            returned_at = CASE WHEN ?3 = 'RETURNED' THEN ?4 ELSE returned_at END,
            updated_at = ?4
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Manifest lines
// =============================================================================

pub(crate) async fn fetch_manifest(
    conn: &mut SqliteConnection,
    expedition_id: &str,
) -> DbResult<Vec<ManifestLine>> {
    debug!(expedition_id = %expedition_id, "Getting manifest lines");

    let lines = sqlx::query_as::<_, ManifestLine>(&format!(
        "SELECT {MANIFEST_COLUMNS} FROM manifest_lines WHERE expedition_id = ?1 ORDER BY product_id ASC"
    ))
    .bind(expedition_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

pub(crate) async fn insert_manifest_line(conn: &mut SqliteConnection, line: &ManifestLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO manifest_lines (
            id, expedition_id, product_id, allocated_units, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&line.id)
    .bind(&line.expedition_id)
    .bind(&line.product_id)
    .bind(line.allocated_units)
    .bind(line.created_at)
    .bind(line.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn update_manifest_line(
    conn: &mut SqliteConnection,
    line_id: &str,
    allocated_units: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE manifest_lines SET allocated_units = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(line_id)
        .bind(allocated_units)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub(crate) async fn delete_manifest_line(conn: &mut SqliteConnection, line_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM manifest_lines WHERE id = ?1")
        .bind(line_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// =============================================================================
// Returns and sales against the manifest
// =============================================================================

pub(crate) async fn insert_return_line(conn: &mut SqliteConnection, line: &ReturnLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO return_lines (
            id, expedition_id, product_id, returned_units, condition, note, recorded_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&line.id)
    .bind(&line.expedition_id)
    .bind(&line.product_id)
    .bind(line.returned_units)
    .bind(line.condition)
    .bind(&line.note)
    .bind(&line.recorded_by)
    .bind(line.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Returned units per (product, condition).
pub(crate) async fn returned_totals(
    conn: &mut SqliteConnection,
    expedition_id: &str,
) -> DbResult<Vec<(String, ReturnCondition, i64)>> {
    let rows = sqlx::query_as::<_, (String, ReturnCondition, i64)>(
        r#"
        SELECT product_id, condition, SUM(returned_units)
        FROM return_lines
        WHERE expedition_id = ?1
        GROUP BY product_id, condition
        "#,
    )
    .bind(expedition_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Units sold per product through approved orders placed on this expedition.
pub(crate) async fn sold_totals(
    conn: &mut SqliteConnection,
    expedition_id: &str,
) -> DbResult<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT l.product_id, SUM(l.quantity_units)
        FROM sale_order_lines l
        JOIN sale_orders o ON o.id = l.order_id
        WHERE o.expedition_id = ?1 AND o.approval_status = 'APPROVED'
        GROUP BY l.product_id
        "#,
    )
    .bind(expedition_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}
