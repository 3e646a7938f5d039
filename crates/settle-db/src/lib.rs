//! # settle-db: Database Layer for the Settlement Core
//!
//! SQLite persistence through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Settlement Data Flow                              │
//! │                                                                         │
//! │  SettlementEngine::create_order / apply_payment / void_order           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     settle-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  UnitOfWork   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│ BEGIN IMMED.  │    │  (embedded)  │  │   │
//! │  │   │               │    │ stock, orders │    │              │  │   │
//! │  │   │ SqlitePool    │    │ payments, ... │    │ 001_init.sql │  │   │
//! │  │   │               │    └───────────────┘    └──────────────┘  │   │
//! │  │   │               │    ┌───────────────┐                      │   │
//! │  │   │               │───►│ Repositories  │  (reads, reports)    │   │
//! │  │   └───────────────┘    └───────────────┘                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`unit_of_work`] - The write transaction boundary
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use settle_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("settle.db")).await?;
//!
//! let mut uow = db.begin().await?;
//! // ... writes ...
//! uow.commit().await?;
//!
//! let order = db.orders().get_by_id("...").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::audit::{AuditOutboxEntry, AuditOutboxRepository};
pub use repository::inventory::InventoryRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::shift::ShiftRepository;
