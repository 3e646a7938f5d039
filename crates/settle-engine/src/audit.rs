//! # Audit Notification
//!
//! Fire-and-forget reporting of committed settlement operations.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  engine op ──► uow.commit() ──► audit.notify(&event)                    │
//! │                                      │                                  │
//! │                 ┌────────────────────┼────────────────────┐             │
//! │                 ▼                    ▼                    ▼             │
//! │           LogAuditSink        OutboxAuditSink       NoopAuditSink       │
//! │           info! line          tokio::spawn          (dropped)           │
//! │                               INSERT audit_outbox                       │
//! │                               failure → warn!                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `notify` runs after the transaction is committed and returns nothing.
//! A sink that fails logs it; the settlement stands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_core::{Money, Order, OrderStatus, Payment, PaymentMethod};
use settle_db::{AuditOutboxRepository, Database};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::AuditMode;

// =============================================================================
// Events
// =============================================================================

/// A committed settlement operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    OrderCreated {
        order_id: String,
        order_number: String,
        shift_id: Option<String>,
        line_count: usize,
        total_amount: Money,
        at: DateTime<Utc>,
    },
    PaymentApplied {
        order_id: String,
        payment_id: String,
        method: PaymentMethod,
        amount: Money,
        paid_amount: Money,
        change_amount: Money,
        status: OrderStatus,
        at: DateTime<Utc>,
    },
    OrderVoided {
        order_id: String,
        order_number: String,
        reason: String,
        /// Units returned to tracked stock.
        restored_units: i64,
        at: DateTime<Utc>,
    },
}

impl SettlementEvent {
    pub fn order_created(order: &Order, line_count: usize) -> Self {
        SettlementEvent::OrderCreated {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            shift_id: order.shift_id.clone(),
            line_count,
            total_amount: order.total_amount,
            at: order.created_at,
        }
    }

    pub fn payment_applied(order: &Order, payment: &Payment) -> Self {
        SettlementEvent::PaymentApplied {
            order_id: order.id.clone(),
            payment_id: payment.id.clone(),
            method: payment.method,
            amount: payment.amount,
            paid_amount: order.paid_amount,
            change_amount: order.change_amount,
            status: order.status,
            at: payment.created_at,
        }
    }

    pub fn order_voided(order: &Order, restored_units: i64) -> Self {
        SettlementEvent::OrderVoided {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            reason: order.cancellation_reason.clone().unwrap_or_default(),
            restored_units,
            at: order.cancelled_at.unwrap_or(order.updated_at),
        }
    }

    /// Outbox `event_type` column value.
    pub fn event_type(&self) -> &'static str {
        match self {
            SettlementEvent::OrderCreated { .. } => "order_created",
            SettlementEvent::PaymentApplied { .. } => "payment_applied",
            SettlementEvent::OrderVoided { .. } => "order_voided",
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            SettlementEvent::OrderCreated { order_id, .. }
            | SettlementEvent::PaymentApplied { order_id, .. }
            | SettlementEvent::OrderVoided { order_id, .. } => order_id,
        }
    }
}

// =============================================================================
// Sink Trait
// =============================================================================

/// Receives settlement events after commit.
///
/// Implementations must not block and must not fail outward.
pub trait AuditSink: Send + Sync {
    fn notify(&self, event: &SettlementEvent);
}

/// Builds the sink selected by configuration.
pub fn sink_for(mode: AuditMode, db: &Database) -> Arc<dyn AuditSink> {
    match mode {
        AuditMode::Log => Arc::new(LogAuditSink),
        AuditMode::Outbox => Arc::new(OutboxAuditSink::new(db.audit_outbox())),
        AuditMode::Off => Arc::new(NoopAuditSink),
    }
}

// =============================================================================
// Implementations
// =============================================================================

/// Writes each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn notify(&self, event: &SettlementEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => info!(
                target: "settle::audit",
                event_type = event.event_type(),
                order_id = %event.order_id(),
                %payload,
                "Settlement event"
            ),
            Err(e) => warn!(
                target: "settle::audit",
                event_type = event.event_type(),
                error = %e,
                "Failed to serialize settlement event"
            ),
        }
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn notify(&self, _event: &SettlementEvent) {}
}

/// Queues each event in the `audit_outbox` table on a spawned task.
#[derive(Debug, Clone)]
pub struct OutboxAuditSink {
    repo: AuditOutboxRepository,
    pending: Arc<Mutex<JoinSet<()>>>,
}

impl OutboxAuditSink {
    pub fn new(repo: AuditOutboxRepository) -> Self {
        OutboxAuditSink {
            repo,
            pending: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Waits for every queued write started so far.
    pub async fn flush(&self) {
        let mut tasks = {
            let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "Audit outbox task did not finish");
            }
        }
    }
}

impl AuditSink for OutboxAuditSink {
    fn notify(&self, event: &SettlementEvent) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!(
                    event_type = event.event_type(),
                    order_id = %event.order_id(),
                    "No runtime to queue audit event, dropping it"
                );
                return;
            }
        };

        let repo = self.repo.clone();
        let event = event.clone();

        let mut tasks = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        // reap finished writes
        while tasks.try_join_next().is_some() {}

        tasks.spawn_on(
            async move {
                let event_type = event.event_type();
                match repo.enqueue(event_type, event.order_id(), &event).await {
                    Ok(entry) => debug!(id = %entry.id, event_type, "Audit event queued"),
                    Err(e) => warn!(
                        event_type,
                        order_id = %event.order_id(),
                        error = %e,
                        "Failed to queue audit event"
                    ),
                }
            },
            &handle,
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use settle_db::DbConfig;

    fn created_event(order_id: &str) -> SettlementEvent {
        SettlementEvent::OrderCreated {
            order_id: order_id.to_string(),
            order_number: "ORD-20260101-000001".to_string(),
            shift_id: None,
            line_count: 2,
            total_amount: Money::from_cents(3000),
            at: Utc::now(),
        }
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(created_event("o-1")).unwrap();
        assert_eq!(json["type"], "order_created");
        assert_eq!(json["order_id"], "o-1");
    }

    #[test]
    fn test_event_type_and_order_id() {
        let event = SettlementEvent::OrderVoided {
            order_id: "o-2".into(),
            order_number: "ORD-20260101-000002".into(),
            reason: "customer left".into(),
            restored_units: 5,
            at: Utc::now(),
        };
        assert_eq!(event.event_type(), "order_voided");
        assert_eq!(event.order_id(), "o-2");
    }

    #[test]
    fn test_noop_and_log_sinks_accept_events() {
        NoopAuditSink.notify(&created_event("o-1"));
        LogAuditSink.notify(&created_event("o-1"));
    }

    #[test]
    fn test_outbox_sink_without_runtime_drops_event() {
        // Building the pool needs a runtime; notify below runs outside it.
        let rt = tokio::runtime::Runtime::new().unwrap();
        let db = rt
            .block_on(Database::new(DbConfig::in_memory()))
            .unwrap();
        let sink = OutboxAuditSink::new(db.audit_outbox());

        sink.notify(&created_event("o-1"));

        let pending = rt.block_on(db.audit_outbox().count_pending()).unwrap();
        assert_eq!(pending, 0);
    }

    #[tokio::test]
    async fn test_outbox_sink_queues_events() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sink = OutboxAuditSink::new(db.audit_outbox());

        sink.notify(&created_event("o-1"));
        sink.notify(&created_event("o-2"));
        sink.flush().await;

        let entries = db.audit_outbox().get_pending(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.event_type == "order_created"));

        let payload: SettlementEvent = serde_json::from_str(&entries[0].payload).unwrap();
        assert_eq!(payload.event_type(), "order_created");
    }

    #[tokio::test]
    async fn test_log_and_off_modes_leave_outbox_empty() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        sink_for(AuditMode::Log, &db).notify(&created_event("o-1"));
        sink_for(AuditMode::Off, &db).notify(&created_event("o-1"));

        assert_eq!(db.audit_outbox().count_pending().await.unwrap(), 0);
    }
}
