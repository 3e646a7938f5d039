//! # Database Error Types
//!
//! What can go wrong underneath a settlement operation.
//!
//! ## Classes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error                                                            │
//! │       │                                                                 │
//! │       ├── no row / guarded UPDATE hit nothing ──► NotFound              │
//! │       ├── UNIQUE (sku, order_number, open shift) ► Duplicate            │
//! │       ├── CHECK / FOREIGN KEY / NOT NULL ───────► Constraint            │
//! │       │     orders_total_identity                                       │
//! │       │     products_stock_non_negative                                 │
//! │       ├── SQLITE_BUSY, pool acquire timeout ────► Busy                  │
//! │       ├── pool closed, bad connect options ─────► Connection            │
//! │       └── anything else ───────────────────────► Query                 │
//! │                                                                         │
//! │  MigrateError ──► Migration        serde_json::Error ──► Payload        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine checks stock and totals before it writes, so a `Constraint`
//! error means the schema caught a write the engine should never have
//! issued. Every class surfaces as `SettleError::Storage`.

use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

/// Names given to the CHECK constraints the settlement rules lean on.
pub mod constraint {
    /// `total_amount = sub_total - discount_amount + tax_amount`
    pub const ORDER_TOTAL_IDENTITY: &str = "orders_total_identity";
    /// `track_inventory = 0 OR stock_quantity >= 0`
    pub const STOCK_NON_NEGATIVE: &str = "products_stock_non_negative";
    pub const FOREIGN_KEY: &str = "foreign_key";
}

// SQLite primary result codes
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A lookup or an id-guarded UPDATE found no row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE constraint rejected the write.
    ///
    /// `field` is `table.column` as SQLite reports it unless a repository
    /// narrowed it (`sku`, `order_number`).
    #[error("Duplicate {field}{}", quoted(.value))]
    Duplicate { field: String, value: Option<String> },

    /// A schema guard rejected the write. `constraint` is the CHECK name
    /// (see [`constraint`]), the CHECK expression for unnamed ones, or
    /// `foreign_key` / the column for FK and NOT NULL failures.
    #[error("Constraint violated: {constraint}")]
    Constraint { constraint: String },

    /// The write lock or a pooled connection was not obtained in time.
    ///
    /// Another unit of work held `BEGIN IMMEDIATE` past `busy_timeout`.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// An audit payload could not be serialized.
    #[error("Payload serialization failed: {0}")]
    Payload(String),

    /// Any other statement failure.
    #[error("Query failed: {0}")]
    Query(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::Duplicate {
            field: field.into(),
            value: Some(value.into()),
        }
    }

    /// The violated constraint, for `Constraint` errors.
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            DbError::Constraint { constraint } => Some(constraint),
            _ => None,
        }
    }

    /// True when another writer held the lock; the operation may be retried.
    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }
}

fn quoted(value: &Option<String>) -> String {
    value
        .as_ref()
        .map(|v| format!(": '{}'", v))
        .unwrap_or_default()
}

fn primary_code(db_err: &dyn DatabaseError) -> Option<i32> {
    db_err
        .code()
        .and_then(|c| c.parse::<i32>().ok())
        .map(|extended| extended & 0xff)
}

/// Text after `"... constraint failed: "`, or the fallback.
fn constraint_subject(msg: &str, fallback: &str) -> String {
    msg.split_once("constraint failed: ")
        .map(|(_, subject)| subject.trim().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::Duplicate {
                        field: constraint_subject(msg, "unknown"),
                        value: None,
                    },
                    ErrorKind::ForeignKeyViolation => DbError::Constraint {
                        constraint: constraint::FOREIGN_KEY.to_string(),
                    },
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::Constraint {
                            constraint: constraint_subject(msg, "check"),
                        }
                    }
                    _ if matches!(
                        primary_code(db_err.as_ref()),
                        Some(SQLITE_BUSY | SQLITE_LOCKED)
                    ) =>
                    {
                        DbError::Busy(msg.to_string())
                    }
                    _ => DbError::Query(msg.to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::Busy("timed out acquiring a connection".into()),
            sqlx::Error::PoolClosed => DbError::Connection("pool is closed".into()),
            sqlx::Error::Io(e) => DbError::Connection(e.to_string()),
            sqlx::Error::Configuration(e) => DbError::Connection(e.to_string()),

            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Payload(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
