//! # settle-core: Pure Settlement Logic
//!
//! This crate is the **heart** of the settlement core. It holds every rule
//! about orders, money and stock as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Settlement Core Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Collaborators (API layer, receipts, reports)          │   │
//! │  │    create order ──► apply payment ──► void ──► shift totals    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               settle-engine (orchestration)                    │   │
//! │  │    SettlementEngine, ShiftAccumulator, AuditSink               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ settle-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │  money   │ │  order   │ │  status  │          │   │
//! │  │   │ Product  │ │  Money   │ │ pricing  │ │  state   │          │   │
//! │  │   │ Payment  │ │          │ │ payments │ │ machine  │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    settle-db (Database Layer)                   │   │
//! │  │         SQLite queries, migrations, UnitOfWork, repositories    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, Payment, Shift, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`status`] - The order status state machine
//! - [`order`] - Order pricing and the order aggregate operations
//! - [`order_number`] - Order number formatting
//! - [`shift`] - Shift reconciliation arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use settle_core::money::Money;
//!
//! // $10.00 inc GST, split by the catalog into 9.09 + 0.91
//! let ex_gst = Money::from_cents(909);
//! let gst = Money::from_cents(91);
//! assert_eq!((ex_gst + gst).cents(), 1000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod order;
pub mod order_number;
pub mod shift;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{NewOrder, OrderLine, PricedLine, PricedOrder};
pub use shift::ShiftSummary;
pub use status::{OrderEvent, OrderStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines accepted in a single order.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches keying mistakes (1000 instead of 10) before stock is reserved.
pub const MAX_LINE_QUANTITY: i64 = 9_999;
