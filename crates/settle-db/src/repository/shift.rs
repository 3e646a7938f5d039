//! # Shift Repository
//!
//! Cashier shifts. `total_sales` / `total_orders` are denormalized and
//! only ever written from a freshly computed summary.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use settle_core::{Money, Shift};

const SELECT_SHIFT: &str = r#"
    SELECT
        id, cashier_id, store_id, status,
        starting_cash, ending_cash, total_sales, total_orders,
        opened_at, closed_at
    FROM shifts
"#;

pub(crate) async fn insert(conn: &mut SqliteConnection, shift: &Shift) -> DbResult<()> {
    debug!(id = %shift.id, cashier_id = %shift.cashier_id, "Opening shift");

    sqlx::query(
        r#"
        INSERT INTO shifts (
            id, cashier_id, store_id, status,
            starting_cash, ending_cash, total_sales, total_orders,
            opened_at, closed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&shift.id)
    .bind(&shift.cashier_id)
    .bind(&shift.store_id)
    .bind(shift.status)
    .bind(shift.starting_cash)
    .bind(shift.ending_cash)
    .bind(shift.total_sales)
    .bind(shift.total_orders)
    .bind(shift.opened_at)
    .bind(shift.closed_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Shift>> {
    let sql = format!("{} WHERE id = ?1", SELECT_SHIFT);

    let shift = sqlx::query_as::<_, Shift>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(shift)
}

pub(crate) async fn open_for_cashier(
    conn: &mut SqliteConnection,
    cashier_id: &str,
) -> DbResult<Option<Shift>> {
    let sql = format!("{} WHERE cashier_id = ?1 AND status = 'open'", SELECT_SHIFT);

    let shift = sqlx::query_as::<_, Shift>(&sql)
        .bind(cashier_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(shift)
}

pub(crate) async fn refresh_totals(
    conn: &mut SqliteConnection,
    id: &str,
    total_sales: Money,
    total_orders: i64,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE shifts SET total_sales = ?2, total_orders = ?3 WHERE id = ?1")
        .bind(id)
        .bind(total_sales)
        .bind(total_orders)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Shift", id));
    }

    Ok(())
}

pub(crate) async fn close(
    conn: &mut SqliteConnection,
    id: &str,
    ending_cash: Money,
    closed_at: DateTime<Utc>,
) -> DbResult<()> {
    debug!(id = %id, ending_cash = %ending_cash, "Closing shift");

    let result = sqlx::query(
        r#"
        UPDATE shifts SET
            status = 'closed',
            ending_cash = ?2,
            closed_at = ?3
        WHERE id = ?1 AND status = 'open'
        "#,
    )
    .bind(id)
    .bind(ending_cash)
    .bind(closed_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Shift (open)", id));
    }

    Ok(())
}

/// Read side for shifts.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Gets a shift by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// The cashier's open shift, if any.
    pub async fn open_for_cashier(&self, cashier_id: &str) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        open_for_cashier(&mut conn, cashier_id).await
    }

    /// Shifts of a store, newest first.
    pub async fn list_for_store(&self, store_id: &str, limit: u32) -> DbResult<Vec<Shift>> {
        let sql = format!(
            "{} WHERE store_id = ?1 ORDER BY opened_at DESC LIMIT ?2",
            SELECT_SHIFT
        );

        let shifts = sqlx::query_as::<_, Shift>(&sql)
            .bind(store_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(shifts)
    }
}
