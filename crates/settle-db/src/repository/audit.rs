//! # Audit Outbox Repository
//!
//! Durable queue of settlement events for the audit/security log.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SETTLEMENT COMMITS (create / pay / void)                               │
//! │       │                                                                 │
//! │       ▼  spawned, after commit                                          │
//! │  INSERT INTO audit_outbox (event_type, order_id, payload)               │
//! │       │                                                                 │
//! │       ▼  audit reader (outside this core)                               │
//! │  SELECT ... WHERE delivered_at IS NULL                                  │
//! │       ├── ok:   mark_delivered → delivered_at = NOW()                   │
//! │       └── fail: mark_failed    → attempts += 1, last_error              │
//! │                                                                         │
//! │  A failed enqueue is logged and dropped; the settlement stands.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// One queued audit event.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditOutboxEntry {
    pub id: String,
    /// `order_created`, `payment_applied`, `order_voided`
    pub event_type: String,
    pub order_id: String,
    /// JSON body of the event.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Repository for audit outbox operations.
#[derive(Debug, Clone)]
pub struct AuditOutboxRepository {
    pool: SqlitePool,
}

impl AuditOutboxRepository {
    /// Creates a new AuditOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditOutboxRepository { pool }
    }

    /// Queues an event, storing `payload` as JSON.
    ///
    /// Fails with `DbError::Payload` if the value does not serialize.
    ///
    /// ## Example
    /// ```rust,ignore
    /// repo.enqueue(event.event_type(), &order.id, &event).await?;
    /// ```
    pub async fn enqueue<T: Serialize + ?Sized>(
        &self,
        event_type: &str,
        order_id: &str,
        payload: &T,
    ) -> DbResult<AuditOutboxEntry> {
        debug!(event_type = %event_type, order_id = %order_id, "Queuing audit event");

        let entry = AuditOutboxEntry {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            order_id: order_id.to_string(),
            payload: serde_json::to_string(payload)?,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            delivered_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO audit_outbox (
                id, event_type, order_id, payload,
                attempts, last_error, created_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.event_type)
        .bind(&entry.order_id)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Undelivered entries, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<AuditOutboxEntry>> {
        let entries = sqlx::query_as::<_, AuditOutboxEntry>(
            r#"
            SELECT
                id, event_type, order_id, payload,
                attempts, last_error, created_at, delivered_at
            FROM audit_outbox
            WHERE delivered_at IS NULL
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Entries for one order, oldest first.
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<AuditOutboxEntry>> {
        let entries = sqlx::query_as::<_, AuditOutboxEntry>(
            r#"
            SELECT
                id, event_type, order_id, payload,
                attempts, last_error, created_at, delivered_at
            FROM audit_outbox
            WHERE order_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as delivered.
    ///
    /// Called by the external audit reader once the entry is forwarded;
    /// the settlement core itself only enqueues.
    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE audit_outbox SET delivered_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Records a delivery failure. Called by the external audit reader.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE audit_outbox SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts undelivered entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_outbox WHERE delivered_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
