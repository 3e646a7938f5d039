//! # settle-engine: Settlement Engine and Shift Accumulator
//!
//! Orchestration layer of the settlement core. Every mutating operation is
//! one [`UnitOfWork`](settle_db::UnitOfWork): it commits whole or not at all.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      settle-engine (THIS CRATE)                         │
//! │                                                                         │
//! │  ┌─────────────────────────────┐   ┌─────────────────────────────┐     │
//! │  │      SettlementEngine       │   │      ShiftAccumulator       │     │
//! │  │                             │   │                             │     │
//! │  │  create_order               │   │  open_shift                 │     │
//! │  │  apply_payment              │   │  summarize                  │     │
//! │  │  void_order                 │   │  refresh_totals             │     │
//! │  │  adjust_stock               │   │  close_shift                │     │
//! │  │  get_order_details, ...     │   │                             │     │
//! │  └──────────────┬──────────────┘   └──────────────┬──────────────┘     │
//! │                 │    after commit                  │                    │
//! │                 ▼                                  │                    │
//! │  ┌─────────────────────────────┐                   │                    │
//! │  │  AuditSink (log/outbox/off) │                   │                    │
//! │  └─────────────────────────────┘                   │                    │
//! │                 │                                  │                    │
//! │                 ▼                                  ▼                    │
//! │        settle-core (rules)            settle-db (Database, UnitOfWork)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use settle_core::{Money, NewOrder, OrderLine, OrderType, PaymentMethod};
//! use settle_engine::{EngineConfig, SettlementEngine};
//!
//! let config = EngineConfig::load(None)?;
//! let engine = SettlementEngine::from_config(&config).await?;
//!
//! let created = engine
//!     .create_order(NewOrder::new(OrderType::Retail, vec![OrderLine::new("p-1", 3)]))
//!     .await?;
//! let order = engine
//!     .apply_payment(&created.order.id, Money::from_cents(5_000), PaymentMethod::Cash, None)
//!     .await?;
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod shift;

pub use audit::{AuditSink, LogAuditSink, NoopAuditSink, OutboxAuditSink, SettlementEvent};
pub use config::{AuditMode, EngineConfig};
pub use engine::{OrderDetails, SettlementEngine, StockAudit};
pub use error::{SettleError, SettleResult};
pub use shift::ShiftAccumulator;

/// Initializes the tracing subscriber for binaries.
///
/// `RUST_LOG` wins; otherwise `info,settle=debug,sqlx=warn`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,settle=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
