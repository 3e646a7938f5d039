//! # Repository Module
//!
//! SQL for the settlement schema.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Each module holds its SQL as `pub(crate)` functions over               │
//! │  `&mut SqliteConnection`, then exposes two callers:                     │
//! │                                                                         │
//! │  XRepository { pool }          reads (and catalog writes) on a pooled   │
//! │  ├── get_by_id(&self, id)      connection, outside any transaction     │
//! │  └── ...                                                                │
//! │                                                                         │
//! │  UnitOfWork { tx }             the same functions on the open           │
//! │  ├── reserve_stock(...)        BEGIN IMMEDIATE transaction; the only    │
//! │  └── ...                       write path for settlement operations    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog and stock
//! - [`InventoryRepository`](inventory::InventoryRepository) - Inventory log
//! - [`OrderRepository`](order::OrderRepository) - Orders, items, payments
//! - [`ShiftRepository`](shift::ShiftRepository) - Cashier shifts
//! - [`AuditOutboxRepository`](audit::AuditOutboxRepository) - Audit queue

pub mod audit;
pub mod inventory;
pub mod order;
pub mod product;
pub(crate) mod sequence;
pub mod shift;
