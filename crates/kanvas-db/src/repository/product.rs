//! # Product Repository
//!
//! Catalog access for the engine.
//!
//! Product CRUD belongs to the dashboard; the engine reads `units_per_package`,
//! `daily_cap_units`, `package_price` and `on_hand_units`, and writes only
//! `on_hand_units` (through [`StockLedger`](crate::engine::StockLedger)).
//! `insert` exists for seeding and tests.

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use kanvas_core::validation::{validate_amount, validate_text, validate_units};
use kanvas_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str = "id, code, name, units_per_package, on_hand_units, daily_cap_units, \
     package_price, is_active, created_at, updated_at";

/// Fields needed to register a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub units_per_package: i64,
    pub on_hand_units: i64,
    pub daily_cap_units: i64,
    pub package_price: i64,
}

impl NewProduct {
    pub fn new(code: impl Into<String>, name: impl Into<String>, units_per_package: i64) -> Self {
        NewProduct {
            code: code.into(),
            name: name.into(),
            units_per_package,
            on_hand_units: 0,
            daily_cap_units: 0,
            package_price: 0,
        }
    }

    pub fn on_hand(mut self, units: i64) -> Self {
        self.on_hand_units = units;
        self
    }

    pub fn daily_cap(mut self, units: i64) -> Self {
        self.daily_cap_units = units;
        self
    }

    pub fn package_price(mut self, price: i64) -> Self {
        self.package_price = price;
        self
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_code("SUSU-1L").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Registers a product.
    ///
    /// `units_per_package` below 1 is stored as 1.
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        validate_text("code", &new.code)?;
        validate_text("name", &new.name)?;
        validate_units("on_hand_units", new.on_hand_units)?;
        validate_units("daily_cap_units", new.daily_cap_units)?;
        validate_amount("package_price", new.package_price)?;

        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            units_per_package: new.units_per_package.max(1),
            on_hand_units: new.on_hand_units,
            daily_cap_units: new.daily_cap_units,
            package_price: new.package_price,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, code = %product.code, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, units_per_package, on_hand_units,
                daily_cap_units, package_price, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.units_per_package)
        .bind(product.on_hand_units)
        .bind(product.daily_cap_units)
        .bind(product.package_price)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        debug!(id = %id, "Getting product by ID");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets a product by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        debug!(code = %code, "Getting product by code");

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products ordered by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        debug!(limit = %limit, "Listing active products");

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name ASC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-level queries (shared with the engine)
// =============================================================================

/// Fetches a product by ID on the given connection.
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Fetches a product or fails with `ProductNotFound`.
pub(crate) async fn require(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}
