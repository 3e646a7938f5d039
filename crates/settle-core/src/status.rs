//! # Order Status State Machine
//!
//! The single place where an order's status is allowed to change.
//!
//! ## Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pending ──── payment, paid < total ────► Processing ◄──┐               │
//! │     │                                        │   └──────┘ paid < total  │
//! │     │                                        │                          │
//! │     ├──── payment, paid >= total ──► Completed ◄── paid >= total        │
//! │     │                                (terminal)                         │
//! │     │                                        │                          │
//! │     └──── void ──────────────► Cancelled ◄── void                       │
//! │                                (terminal)                               │
//! │                                                                         │
//! │  Nothing leaves Completed or Cancelled.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, stock reserved, nothing paid yet.
    Pending,
    /// At least one payment received, balance outstanding.
    Processing,
    /// Fully paid. Terminal.
    Completed,
    /// Voided; reserved stock returned. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Returns the lowercase name used in storage and messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true for `Completed` and `Cancelled`.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Computes the next status for an event.
    ///
    /// This is the only function that decides a status change; the order
    /// aggregate calls it and never assigns `status` on its own.
    ///
    /// ## Example
    /// ```rust
    /// use settle_core::money::Money;
    /// use settle_core::status::{OrderEvent, OrderStatus};
    ///
    /// let next = OrderStatus::Pending
    ///     .transition(OrderEvent::PaymentApplied {
    ///         paid: Money::from_cents(5000),
    ///         total: Money::from_cents(10000),
    ///     })
    ///     .unwrap();
    /// assert_eq!(next, OrderStatus::Processing);
    ///
    /// assert!(OrderStatus::Completed.transition(OrderEvent::Voided).is_err());
    /// ```
    pub fn transition(self, event: OrderEvent) -> Result<OrderStatus, IllegalTransition> {
        match (self, event) {
            (
                OrderStatus::Pending | OrderStatus::Processing,
                OrderEvent::PaymentApplied { paid, total },
            ) => {
                if paid >= total {
                    Ok(OrderStatus::Completed)
                } else if paid.is_positive() {
                    Ok(OrderStatus::Processing)
                } else {
                    Ok(self)
                }
            }
            (OrderStatus::Pending | OrderStatus::Processing, OrderEvent::Voided) => {
                Ok(OrderStatus::Cancelled)
            }
            (from, event) => Err(IllegalTransition {
                from,
                operation: event.operation(),
            }),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Events
// =============================================================================

/// Something that happened to an order and may move its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    /// A payment was appended; `paid` is the new running total.
    PaymentApplied { paid: Money, total: Money },
    /// The order was voided.
    Voided,
}

impl OrderEvent {
    /// Short verb for error messages.
    pub const fn operation(&self) -> &'static str {
        match self {
            OrderEvent::PaymentApplied { .. } => "apply payment",
            OrderEvent::Voided => "void",
        }
    }
}

/// An event was applied to a status that does not accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {operation} an order that is {from}")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub operation: &'static str,
}

// =============================================================================
// Unit Tests
// =============================================================================
