//! # Order Repository
//!
//! Orders, their items and the payment ledger.
//!
//! ## Order Lifecycle in Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE        INSERT orders (pending) + INSERT order_items          │
//! │                                                                         │
//! │  2. PAY (n times) INSERT payments                                       │
//! │                   SUM(payments.amount) → orders.paid_amount             │
//! │                   UPDATE orders SET status, paid, change, completed_at  │
//! │                                                                         │
//! │  3. VOID          UPDATE orders SET status = 'cancelled', reason, at    │
//! │                                                                         │
//! │  Totals columns are written once at step 1 and never updated.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use settle_core::{Money, Order, OrderItem, Payment};

const SELECT_ORDER: &str = r#"
    SELECT
        id, order_number, status, order_type,
        customer_id, table_number, store_id, cashier_id, shift_id,
        sub_total, discount_amount, tax_amount, total_amount,
        paid_amount, change_amount,
        cancellation_reason, cancelled_at, completed_at,
        created_at, updated_at
    FROM orders
"#;

const SELECT_ITEM: &str = r#"
    SELECT
        id, order_id, product_id, product_name, quantity,
        unit_price_ex_gst, unit_gst_amount,
        sub_total, tax_amount, total_amount, created_at
    FROM order_items
"#;

const SELECT_PAYMENT: &str = r#"
    SELECT p.id, p.order_id, p.amount, p.method, p.reference, p.created_at
    FROM payments p
"#;

// =============================================================================
// Queries (shared by the repository and UnitOfWork)
// =============================================================================

pub(crate) async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, status, order_type,
            customer_id, table_number, store_id, cashier_id, shift_id,
            sub_total, discount_amount, tax_amount, total_amount,
            paid_amount, change_amount,
            cancellation_reason, cancelled_at, completed_at,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13,
            ?14, ?15,
            ?16, ?17, ?18,
            ?19, ?20
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(order.status)
    .bind(order.order_type)
    .bind(&order.customer_id)
    .bind(&order.table_number)
    .bind(&order.store_id)
    .bind(&order.cashier_id)
    .bind(&order.shift_id)
    .bind(order.sub_total)
    .bind(order.discount_amount)
    .bind(order.tax_amount)
    .bind(order.total_amount)
    .bind(order.paid_amount)
    .bind(order.change_amount)
    .bind(&order.cancellation_reason)
    .bind(order.cancelled_at)
    .bind(order.completed_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::Duplicate { field, .. } if field.ends_with("order_number") => {
            DbError::duplicate("order_number", order.order_number.clone())
        }
        other => other,
    })?;

    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    debug!(order_id = %item.order_id, product_id = %item.product_id, "Adding order item");

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, product_name, quantity,
            unit_price_ex_gst, unit_gst_amount,
            sub_total, tax_amount, total_amount, created_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7,
            ?8, ?9, ?10, ?11
        )
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price_ex_gst)
    .bind(item.unit_gst_amount)
    .bind(item.sub_total)
    .bind(item.tax_amount)
    .bind(item.total_amount)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("{} WHERE id = ?1", SELECT_ORDER);

    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<OrderItem>> {
    let sql = format!("{} WHERE order_id = ?1 ORDER BY rowid", SELECT_ITEM);

    let items = sqlx::query_as::<_, OrderItem>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

/// Writes the settlement fields of an order. Totals are never rewritten.
pub(crate) async fn update_settlement(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, status = %order.status, "Updating order settlement");

    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = ?2,
            paid_amount = ?3,
            change_amount = ?4,
            completed_at = ?5,
            cancellation_reason = ?6,
            cancelled_at = ?7,
            updated_at = ?8
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(order.status)
    .bind(order.paid_amount)
    .bind(order.change_amount)
    .bind(order.completed_at)
    .bind(&order.cancellation_reason)
    .bind(order.cancelled_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", order.id.clone()));
    }

    Ok(())
}

pub(crate) async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(order_id = %payment.order_id, amount = %payment.amount, "Recording payment");

    sqlx::query(
        r#"
        INSERT INTO payments (id, order_id, amount, method, reference, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(payment.amount)
    .bind(payment.method)
    .bind(&payment.reference)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_payments(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<Payment>> {
    let sql = format!("{} WHERE p.order_id = ?1 ORDER BY p.rowid", SELECT_PAYMENT);

    let payments = sqlx::query_as::<_, Payment>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(payments)
}

/// Σ payment.amount for an order, recomputed from the ledger.
pub(crate) async fn payments_total(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Money> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE order_id = ?1")
            .bind(order_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(Money::from_cents(total))
}

pub(crate) async fn orders_for_shift(
    conn: &mut SqliteConnection,
    shift_id: &str,
) -> DbResult<Vec<Order>> {
    let sql = format!("{} WHERE shift_id = ?1 ORDER BY created_at, rowid", SELECT_ORDER);

    let orders = sqlx::query_as::<_, Order>(&sql)
        .bind(shift_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(orders)
}

pub(crate) async fn payments_for_shift(
    conn: &mut SqliteConnection,
    shift_id: &str,
) -> DbResult<Vec<Payment>> {
    let sql = format!(
        "{} INNER JOIN orders o ON o.id = p.order_id WHERE o.shift_id = ?1 ORDER BY p.rowid",
        SELECT_PAYMENT
    );

    let payments = sqlx::query_as::<_, Payment>(&sql)
        .bind(shift_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(payments)
}

// =============================================================================
// Repository
// =============================================================================

/// Read side for orders, items and payments.
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
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Gets an order by its order number.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let sql = format!("{} WHERE order_number = ?1", SELECT_ORDER);

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets all items for an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, order_id).await
    }

    /// Gets all payments for an order, in the order they were applied.
    pub async fn get_payments(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_payments(&mut conn, order_id).await
    }

    /// Gets total amount paid for an order.
    pub async fn get_total_paid(&self, order_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        payments_total(&mut conn, order_id).await
    }

    /// All orders stamped with a shift, cancelled ones included.
    pub async fn list_for_shift(&self, shift_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        orders_for_shift(&mut conn, shift_id).await
    }

    /// All payments on orders stamped with a shift.
    pub async fn payments_for_shift(&self, shift_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        payments_for_shift(&mut conn, shift_id).await
    }

    /// Counts orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
