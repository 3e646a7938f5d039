//! Named counters.
//!
//! Each call to [`next_value`] inside a write transaction returns a value no
//! other committed transaction has seen. A rolled-back transaction gives its
//! value back, so gaps only appear if a commit itself fails.

use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Increments and returns the counter, starting at 1.
pub(crate) async fn next_value(conn: &mut SqliteConnection, name: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequences (name, value) VALUES (?1, 1)
        ON CONFLICT(name) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_counter_increments_per_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(next_value(&mut conn, "a").await.unwrap(), 1);
        assert_eq!(next_value(&mut conn, "a").await.unwrap(), 2);
        assert_eq!(next_value(&mut conn, "b").await.unwrap(), 1);
        assert_eq!(next_value(&mut conn, "a").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rolled_back_value_is_reused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut uow = db.begin().await.unwrap();
        assert_eq!(uow.next_sequence("order_number").await.unwrap(), 1);
        uow.rollback().await.unwrap();

        let mut uow = db.begin().await.unwrap();
        assert_eq!(uow.next_sequence("order_number").await.unwrap(), 1);
        uow.commit().await.unwrap();

        let mut uow = db.begin().await.unwrap();
        assert_eq!(uow.next_sequence("order_number").await.unwrap(), 2);
        uow.commit().await.unwrap();
    }
}
