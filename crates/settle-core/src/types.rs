//! # Domain Types
//!
//! Core domain types shared by the database layer and the settlement engine.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price_ex_gst   │   │  order_number   │   │  order_id (FK)  │       │
//! │  │  gst_amount     │◄──│  status         │──►│  method         │       │
//! │  │  stock_quantity │   │  totals         │   │  amount         │       │
//! │  └────────┬────────┘   └────────┬────────┘   └─────────────────┘       │
//! │           │                     │ owns                                  │
//! │           ▼                     ▼                                       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ InventoryTxn    │   │   OrderItem     │   │     Shift       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  quantity_delta │   │  quantity       │   │  starting_cash  │       │
//! │  │  reason         │   │  unit prices    │   │  ending_cash    │       │
//! │  │  order_id       │   │  line totals    │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names serialize in camelCase (`orderNumber`, `subTotal`,
//! `totalAmount`, ...) because receipt and report readers depend on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::status::OrderStatus;

// =============================================================================
// Product
// =============================================================================

/// A catalog product as seen by the settlement core.
///
/// The catalog owns prices; the core only reads them and only writes
/// `stock_quantity`, and only when `track_inventory` is set.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,

    /// Unit price before GST.
    pub price_ex_gst: Money,

    /// GST component of the unit price, resolved by the catalog.
    pub gst_amount: Money,

    /// Authoritative on-hand count.
    pub stock_quantity: i64,

    /// Stock at the moment the product entered the ledger.
    /// `initial_stock + Σ inventory deltas == stock_quantity`.
    pub initial_stock: i64,

    /// When false, stock is never checked or mutated.
    pub track_inventory: bool,

    pub low_stock_threshold: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit price including GST.
    #[inline]
    pub fn price_inc_gst(&self) -> Money {
        self.price_ex_gst + self.gst_amount
    }

    /// Checks whether `quantity` units could be reserved right now.
    ///
    /// Advisory only: the ledger's conditional update is what decides.
    pub fn can_reserve(&self, quantity: i64) -> bool {
        !self.track_inventory || self.stock_quantity >= quantity
    }

    /// True when a tracked product is at or below its threshold.
    pub fn is_low_stock(&self) -> bool {
        self.track_inventory && self.stock_quantity <= self.low_stock_threshold
    }
}

// =============================================================================
// Order Type
// =============================================================================

/// How the order is fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
    Retail,
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::Retail
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order and its settlement state.
///
/// ## Invariants
/// - `total_amount == sub_total - discount_amount + tax_amount`
/// - `sub_total == Σ item.sub_total`
/// - `paid_amount == Σ payment.amount`
/// - `shift_id` is set once at creation and never changes
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub customer_id: Option<String>,
    pub table_number: Option<String>,
    pub store_id: Option<String>,
    pub cashier_id: Option<String>,
    pub shift_id: Option<String>,
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub change_amount: Money,
    pub cancellation_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Amount still owed, never negative.
    pub fn balance_due(&self) -> Money {
        self.total_amount.saturating_sub_to_zero(self.paid_amount)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line of an order.
/// Uses the snapshot pattern: name and unit prices are frozen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_ex_gst: Money,
    pub unit_gst_amount: Money,
    /// `unit_price_ex_gst × quantity`.
    pub sub_total: Money,
    /// `unit_gst_amount × quantity`.
    pub tax_amount: Money,
    /// `sub_total + tax_amount`.
    pub total_amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    DigitalWallet,
    Other,
}

impl PaymentMethod {
    /// Card payments are reconciled together on the shift report.
    pub const fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "credit" | "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit" | "debit_card" => Ok(PaymentMethod::DebitCard),
            "wallet" | "digital_wallet" => Ok(PaymentMethod::DigitalWallet),
            "other" => Ok(PaymentMethod::Other),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// A payment applied to an order. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    /// External reference (card auth code, wallet transaction id, ...).
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory Transaction
// =============================================================================

/// Why a product's stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryReason {
    /// Reserved by order creation (negative delta).
    Sale,
    /// Returned by an order void (positive delta).
    Return,
    /// Manual receiving or correction.
    Adjustment,
}

impl fmt::Display for InventoryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryReason::Sale => write!(f, "sale"),
            InventoryReason::Return => write!(f, "return"),
            InventoryReason::Adjustment => write!(f, "adjustment"),
        }
    }
}

/// One stock movement. Append-only; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: String,
    pub product_id: String,
    /// Negative for sales, positive for returns.
    pub quantity_delta: i64,
    pub reason: InventoryReason,
    /// The order that caused the movement, if any.
    pub order_id: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shift
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

/// A cashier's working session.
///
/// `total_sales` and `total_orders` are denormalized copies refreshed from
/// the orders tagged with this shift.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: String,
    pub cashier_id: String,
    pub store_id: String,
    pub status: ShiftStatus,
    pub starting_cash: Money,
    pub ending_cash: Option<Money>,
    pub total_sales: Money,
    pub total_orders: i64,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
