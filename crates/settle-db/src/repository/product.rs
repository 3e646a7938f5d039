//! # Product Repository
//!
//! The catalog and its stock ledger.
//!
//! ## Stock Mutations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve (sale)          conditional decrement, all-or-nothing          │
//! │    UPDATE products SET stock_quantity = stock_quantity - :q             │
//! │    WHERE id = :id AND track_inventory = 1 AND stock_quantity >= :q      │
//! │    rows_affected = 0  →  not enough stock                               │
//! │                                                                         │
//! │  restore (void)          stock_quantity + :q, whatever the flag is now  │
//! │  adjust  (manual)        stock_quantity + :delta, never below zero      │
//! │                                                                         │
//! │  Untracked products are never reserved or adjusted.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is paired with an inventory transaction row by the
//! caller, in the same unit of work.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use settle_core::Product;

const SELECT_PRODUCT: &str = r#"
    SELECT
        id, sku, name, price_ex_gst, gst_amount,
        stock_quantity, initial_stock, track_inventory, low_stock_threshold,
        created_at, updated_at
    FROM products
"#;

// =============================================================================
// Queries (shared by the repository and UnitOfWork)
// =============================================================================

pub(crate) async fn fetch_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("{} WHERE id = ?1", SELECT_PRODUCT);

    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

pub(crate) async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, sku = %product.sku, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, sku, name, price_ex_gst, gst_amount,
            stock_quantity, initial_stock, track_inventory, low_stock_threshold,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11
        )
        "#,
    )
    .bind(&product.id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(product.price_ex_gst)
    .bind(product.gst_amount)
    .bind(product.stock_quantity)
    .bind(product.initial_stock)
    .bind(product.track_inventory)
    .bind(product.low_stock_threshold)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::Duplicate { field, .. } if field.ends_with("sku") => {
            DbError::duplicate("sku", product.sku.clone())
        }
        other => other,
    })?;

    Ok(())
}

/// Decrements tracked stock if at least `quantity` is on hand.
///
/// Returns `false` when the guard rejected the update.
pub(crate) async fn reserve(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(product_id = %id, quantity, "Reserving stock");

    let result = sqlx::query(
        r#"
        UPDATE products SET
            stock_quantity = stock_quantity - ?2,
            updated_at = ?3
        WHERE id = ?1
          AND track_inventory = 1
          AND stock_quantity >= ?2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Puts back units taken by an earlier reservation.
///
/// Not guarded by `track_inventory`: the units were reserved while the
/// product was tracked, and the catalog may have switched it off since.
pub(crate) async fn restore(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(product_id = %id, quantity, "Restoring stock");

    let result = sqlx::query(
        r#"
        UPDATE products SET
            stock_quantity = stock_quantity + ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", id));
    }

    Ok(())
}

/// Applies a signed delta to tracked stock unless it would go negative.
///
/// Returns `false` when the guard rejected the update.
pub(crate) async fn adjust(
    conn: &mut SqliteConnection,
    id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(product_id = %id, delta, "Adjusting stock");

    let result = sqlx::query(
        r#"
        UPDATE products SET
            stock_quantity = stock_quantity + ?2,
            updated_at = ?3
        WHERE id = ?1
          AND track_inventory = 1
          AND stock_quantity + ?2 >= 0
        "#,
    )
    .bind(id)
    .bind(delta)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product reads and catalog writes outside a unit of work.
///
/// ## Usage
/// ```rust,ignore
/// let product = db.products().get_by_id("p-1").await?;
/// let low = db.products().list_low_stock().await?;
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

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("{} WHERE sku = ?1", SELECT_PRODUCT);

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a catalog product.
    ///
    /// `initial_stock` should equal `stock_quantity` for a new product; it
    /// is the starting point of the conservation audit.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, product).await
    }

    /// Lists all products ordered by SKU.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("{} ORDER BY sku", SELECT_PRODUCT);

        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Tracked products at or below their low-stock threshold, lowest first.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "{} WHERE track_inventory = 1 AND stock_quantity <= low_stock_threshold \
             ORDER BY stock_quantity ASC, sku ASC",
            SELECT_PRODUCT
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Low stock products");
        Ok(products)
    }

    /// Switches stock tracking on or off for a product.
    ///
    /// Stock on hand is left as it is. Switching tracking off stops
    /// reservations; units already reserved are still restored on void.
    pub async fn set_track_inventory(&self, id: &str, track: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET track_inventory = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(track)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(product_id = %id, track, "Stock tracking changed");
        Ok(())
    }

    /// Counts products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use settle_core::Money;

    fn product(id: &str, stock: i64, tracked: bool) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            price_ex_gst: Money::from_cents(909),
            gst_amount: Money::from_cents(91),
            stock_quantity: stock,
            initial_stock: stock,
            track_inventory: tracked,
            low_stock_threshold: 2,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&product("p-1", 10, true)).await.unwrap();

        let loaded = repo.get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(loaded.sku, "SKU-p-1");
        assert_eq!(loaded.price_ex_gst.cents(), 909);
        assert!(loaded.track_inventory);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
        assert_eq!(repo.get_by_sku("SKU-p-1").await.unwrap().unwrap().id, "p-1");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&product("p-1", 10, true)).await.unwrap();
        let mut dup = product("p-2", 10, true);
        dup.sku = "SKU-p-1".to_string();

        let err = repo.insert(&dup).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_reserve_is_conditional() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&product("p-1", 3, true)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(reserve(&mut conn, "p-1", 2, Utc::now()).await.unwrap());
        assert!(!reserve(&mut conn, "p-1", 2, Utc::now()).await.unwrap());
        assert!(reserve(&mut conn, "p-1", 1, Utc::now()).await.unwrap());
        drop(conn);

        let loaded = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 0);
    }

    #[tokio::test]
    async fn test_untracked_never_mutated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&product("svc", 0, false)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!reserve(&mut conn, "svc", 5, Utc::now()).await.unwrap());
        assert!(!adjust(&mut conn, "svc", 5, Utc::now()).await.unwrap());
        drop(conn);

        let loaded = db.products().get_by_id("svc").await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 0);
    }

    #[tokio::test]
    async fn test_restore_ignores_tracking_flag() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&product("p-1", 5, true)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(reserve(&mut conn, "p-1", 4, Utc::now()).await.unwrap());
        drop(conn);

        db.products().set_track_inventory("p-1", false).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        restore(&mut conn, "p-1", 4, Utc::now()).await.unwrap();
        let err = restore(&mut conn, "missing", 1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        drop(conn);

        let loaded = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 5);
        assert!(!loaded.track_inventory);
        assert!(db.products().set_track_inventory("missing", true).await.is_err());
    }

    #[tokio::test]
    async fn test_adjust_never_negative_and_low_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&product("p-1", 5, true)).await.unwrap();
        db.products().insert(&product("p-2", 1, true)).await.unwrap();
        db.products().insert(&product("svc", 0, false)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!adjust(&mut conn, "p-1", -6, Utc::now()).await.unwrap());
        assert!(adjust(&mut conn, "p-1", -3, Utc::now()).await.unwrap());
        drop(conn);

        let low = db.products().list_low_stock().await.unwrap();
        let ids: Vec<&str> = low.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p-2", "p-1"]);
    }
}
