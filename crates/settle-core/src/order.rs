//! # Order Aggregate
//!
//! Pricing at creation and the two mutations an order ever sees after
//! that: a payment, or a void.
//!
//! ## Creation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewOrder { lines: [(product_id, qty)], discount }                      │
//! │       │                                                                 │
//! │       ▼  validate()            empty list / qty <= 0 → ValidationError  │
//! │       │                                                                 │
//! │       ▼  PricedOrder::price()  price components × qty, summed           │
//! │       │                                                                 │
//! │       │    line.sub_total  = unit_price_ex_gst × qty                    │
//! │       │    line.tax_amount = unit_gst_amount × qty                      │
//! │       │    order.total     = Σ sub_total − discount + Σ tax             │
//! │       │                                                                 │
//! │       ▼  into_order()          Order { status: Pending } + OrderItems   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are computed once, here. Nothing recomputes them later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::status::{OrderEvent, OrderStatus};
use crate::types::{Order, OrderItem, OrderType, Product};
use crate::validation::{
    validate_discount, validate_line_count, validate_payment_amount, validate_quantity,
    validate_required,
};

// =============================================================================
// Requests
// =============================================================================

/// One requested line: a product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A request to create an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_type: OrderType,
    pub customer_id: Option<String>,
    pub table_number: Option<String>,
    pub store_id: Option<String>,
    /// Used to look up the cashier's open shift.
    pub cashier_id: Option<String>,
    #[serde(default)]
    pub discount_amount: Money,
    pub lines: Vec<OrderLine>,
}

impl NewOrder {
    /// Creates a request with the given type and lines, no discount.
    pub fn new(order_type: OrderType, lines: Vec<OrderLine>) -> Self {
        NewOrder {
            order_type,
            lines,
            ..Default::default()
        }
    }

    pub fn with_cashier(mut self, cashier_id: impl Into<String>) -> Self {
        self.cashier_id = Some(cashier_id.into());
        self
    }

    pub fn with_store(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount_amount = discount;
        self
    }

    /// Checks everything that can be checked without the catalog.
    pub fn validate(&self) -> CoreResult<()> {
        validate_line_count(self.lines.len())?;

        for line in &self.lines {
            validate_required("product id", &line.product_id)?;
            validate_quantity(line.quantity)?;
        }

        if self.discount_amount.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "discount".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// A line after its product has been resolved and priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub track_inventory: bool,
    pub unit_price_ex_gst: Money,
    pub unit_gst_amount: Money,
    pub sub_total: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

impl PricedLine {
    /// Prices one line from the product's current price components.
    pub fn price(product: &Product, quantity: i64) -> CoreResult<Self> {
        validate_quantity(quantity)?;

        let overflow = || ValidationError::OutOfRange {
            field: "line total".to_string(),
            min: 0,
            max: i64::MAX,
        };

        let sub_total = product
            .price_ex_gst
            .multiply_quantity(quantity)
            .ok_or_else(overflow)?;
        let tax_amount = product
            .gst_amount
            .multiply_quantity(quantity)
            .ok_or_else(overflow)?;

        Ok(PricedLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            track_inventory: product.track_inventory,
            unit_price_ex_gst: product.price_ex_gst,
            unit_gst_amount: product.gst_amount,
            sub_total,
            tax_amount,
            total_amount: sub_total + tax_amount,
        })
    }
}

/// An order whose totals are fixed, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

impl PricedOrder {
    /// Sums priced lines into order totals and applies the discount.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::Utc;
    /// use settle_core::{Money, PricedLine, PricedOrder, Product};
    ///
    /// let now = Utc::now();
    /// let product = Product {
    ///     id: "p-1".into(),
    ///     sku: "FW".into(),
    ///     name: "Flat White".into(),
    ///     price_ex_gst: Money::from_cents(909),
    ///     gst_amount: Money::from_cents(91),
    ///     stock_quantity: 10,
    ///     initial_stock: 10,
    ///     track_inventory: true,
    ///     low_stock_threshold: 0,
    ///     created_at: now,
    ///     updated_at: now,
    /// };
    ///
    /// let line = PricedLine::price(&product, 3).unwrap();
    /// let order = PricedOrder::price(vec![line], Money::zero()).unwrap();
    /// assert_eq!(order.sub_total.cents(), 2727);
    /// assert_eq!(order.tax_amount.cents(), 273);
    /// assert_eq!(order.total_amount.cents(), 3000);
    /// ```
    pub fn price(lines: Vec<PricedLine>, discount_amount: Money) -> CoreResult<Self> {
        validate_line_count(lines.len())?;

        let sub_total: Money = lines.iter().map(|l| l.sub_total).sum();
        let tax_amount: Money = lines.iter().map(|l| l.tax_amount).sum();

        validate_discount(discount_amount, sub_total)?;

        Ok(PricedOrder {
            total_amount: sub_total - discount_amount + tax_amount,
            lines,
            sub_total,
            discount_amount,
            tax_amount,
        })
    }

    /// Materializes the order row and its items.
    ///
    /// `item_id` is called once per line so the caller owns id generation.
    pub fn into_order(
        self,
        id: String,
        order_number: String,
        request: &NewOrder,
        shift_id: Option<String>,
        now: DateTime<Utc>,
        mut item_id: impl FnMut() -> String,
    ) -> (Order, Vec<OrderItem>) {
        let items = self
            .lines
            .into_iter()
            .map(|line| OrderItem {
                id: item_id(),
                order_id: id.clone(),
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price_ex_gst: line.unit_price_ex_gst,
                unit_gst_amount: line.unit_gst_amount,
                sub_total: line.sub_total,
                tax_amount: line.tax_amount,
                total_amount: line.total_amount,
                created_at: now,
            })
            .collect();

        let order = Order {
            id,
            order_number,
            status: OrderStatus::Pending,
            order_type: request.order_type,
            customer_id: request.customer_id.clone(),
            table_number: request.table_number.clone(),
            store_id: request.store_id.clone(),
            cashier_id: request.cashier_id.clone(),
            shift_id,
            sub_total: self.sub_total,
            discount_amount: self.discount_amount,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
            paid_amount: Money::zero(),
            change_amount: Money::zero(),
            cancellation_reason: None,
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        (order, items)
    }
}

// =============================================================================
// Aggregate Operations
// =============================================================================

impl Order {
    /// Routes an event through the state machine, mapping an illegal
    /// transition to `InvalidOrderState` for this order.
    fn transition(&mut self, event: OrderEvent) -> CoreResult<()> {
        self.status = self
            .status
            .transition(event)
            .map_err(|e| CoreError::invalid_state(&self.id, e.from, e.operation))?;
        Ok(())
    }

    /// Fails with `InvalidOrderState` unless a payment can still be applied.
    pub fn ensure_accepts_payment(&self) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::invalid_state(
                &self.id,
                self.status,
                OrderEvent::PaymentApplied {
                    paid: self.paid_amount,
                    total: self.total_amount,
                }
                .operation(),
            ));
        }
        Ok(())
    }

    /// Applies a payment given the recomputed sum of all payment rows,
    /// including the one being added.
    ///
    /// ## Effects
    /// - `paid_amount = payments_total`
    /// - settled: `Completed`, `completed_at = now`,
    ///   `change_amount = paid − total` (never negative)
    /// - otherwise: `Processing`, no change due
    pub fn apply_payment(
        &mut self,
        amount: Money,
        payments_total: Money,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        validate_payment_amount(amount)?;
        self.ensure_accepts_payment()?;

        self.transition(OrderEvent::PaymentApplied {
            paid: payments_total,
            total: self.total_amount,
        })?;

        self.paid_amount = payments_total;
        if self.status == OrderStatus::Completed {
            self.completed_at = Some(now);
            self.change_amount = payments_total.saturating_sub_to_zero(self.total_amount);
        } else {
            self.change_amount = Money::zero();
        }
        self.updated_at = now;

        Ok(())
    }

    /// Cancels the order. Stock restoration is the caller's job; payments
    /// are left untouched.
    pub fn void(&mut self, reason: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let reason = validate_required("cancellation reason", reason)?;

        self.transition(OrderEvent::Voided)?;

        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(now);
        self.updated_at = now;

        Ok(())
    }

    /// Checks the arithmetic invariants against the order's own items.
    pub fn totals_consistent(&self, items: &[OrderItem]) -> bool {
        let items_sub_total: Money = items.iter().map(|i| i.sub_total).sum();
        let items_tax: Money = items.iter().map(|i| i.tax_amount).sum();

        self.sub_total == items_sub_total
            && self.tax_amount == items_tax
            && self.total_amount == self.sub_total - self.discount_amount + self.tax_amount
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
