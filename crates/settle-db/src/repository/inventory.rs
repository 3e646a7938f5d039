//! # Inventory Transaction Log
//!
//! Append-only record of every stock mutation. There is no update or
//! delete here.
//!
//! For a tracked product, at every commit point:
//! `initial_stock + Σ quantity_delta == stock_quantity`.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use settle_core::InventoryTransaction;

const SELECT_TRANSACTION: &str = r#"
    SELECT id, product_id, quantity_delta, reason, order_id, note, created_at
    FROM inventory_transactions
"#;

pub(crate) async fn insert(conn: &mut SqliteConnection, entry: &InventoryTransaction) -> DbResult<()> {
    debug!(
        product_id = %entry.product_id,
        delta = entry.quantity_delta,
        reason = %entry.reason,
        "Recording inventory transaction"
    );

    sqlx::query(
        r#"
        INSERT INTO inventory_transactions (
            id, product_id, quantity_delta, reason, order_id, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.product_id)
    .bind(entry.quantity_delta)
    .bind(entry.reason)
    .bind(&entry.order_id)
    .bind(&entry.note)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn for_order(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<InventoryTransaction>> {
    let sql = format!("{} WHERE order_id = ?1 ORDER BY created_at, rowid", SELECT_TRANSACTION);

    let entries = sqlx::query_as::<_, InventoryTransaction>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(entries)
}

/// Repository for reading the inventory log.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// All movements of one product, oldest first.
    pub async fn history(&self, product_id: &str) -> DbResult<Vec<InventoryTransaction>> {
        let sql = format!(
            "{} WHERE product_id = ?1 ORDER BY created_at, rowid",
            SELECT_TRANSACTION
        );

        let entries = sqlx::query_as::<_, InventoryTransaction>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Movements caused by one order (sales, and returns if it was voided).
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<InventoryTransaction>> {
        let mut conn = self.pool.acquire().await?;
        for_order(&mut conn, order_id).await
    }

    /// Net movement of a product since it was created.
    pub async fn net_delta(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_delta), 0) FROM inventory_transactions WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Counts all log rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
