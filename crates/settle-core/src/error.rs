//! # Error Types
//!
//! Domain-specific error types for settle-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  settle-core errors (this file)                                        │
//! │  ├── CoreError        - Expected settlement failures                   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  settle-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  settle-engine errors                                                  │
//! │  └── SettleError      - Domain(CoreError) | Storage(DbError)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SettleError → API layer           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is a local, expected failure. Callers map them to
//! client-visible rejections; none of them should crash the process.

use thiserror::Error;

use crate::status::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Expected failures of the settlement operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A product referenced by an order line does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough on-hand stock to reserve a line.
    ///
    /// ## User Workflow
    /// ```text
    /// Create order (qty: 100)
    ///      │
    ///      ▼
    /// Reserve stock: on hand = 2
    ///      │
    ///      ▼
    /// InsufficientStock { available: 2, requested: 100 }
    ///      │
    ///      ▼
    /// Whole order rejected, nothing written
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The order's status does not allow the requested operation.
    ///
    /// ## When This Occurs
    /// - Applying a payment to a completed or cancelled order
    /// - Voiding a cancelled (or completed) order
    #[error("Order {order_id} is {status}, cannot {operation}")]
    InvalidOrderState {
        order_id: String,
        status: OrderStatus,
        operation: String,
    },

    /// Shift cannot be found.
    #[error("Shift not found: {0}")]
    ShiftNotFound(String),

    /// The cashier already has an open shift.
    #[error("Cashier {cashier_id} already has open shift {shift_id}")]
    ShiftAlreadyOpen { cashier_id: String, shift_id: String },

    /// The shift was closed earlier.
    #[error("Shift {0} is already closed")]
    ShiftClosed(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidOrderState error.
    pub fn invalid_state(
        order_id: impl Into<String>,
        status: OrderStatus,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidOrderState {
            order_id: order_id.into(),
            status,
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any stock is touched or any row is written.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A collection that must have members is empty.
    #[error("{field} must not be empty")]
    Empty { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value has the wrong shape for the operation.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
