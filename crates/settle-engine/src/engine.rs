//! # Settlement Engine
//!
//! The three mutating operations of the settlement core, each one
//! transaction script over a single [`UnitOfWork`](settle_db::UnitOfWork),
//! plus the read models built on top of them.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Operation, One Transaction                       │
//! │                                                                         │
//! │   validate input (no I/O)                                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   db.begin()  ──────────── BEGIN IMMEDIATE (write lock taken here)      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   load → decide (settle-core) → write                                   │
//! │        │        any error: uow dropped → ROLLBACK, store unchanged      │
//! │        ▼                                                                │
//! │   uow.commit()                                                          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   audit.notify(event)  ─── after commit; cannot undo the operation      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Pairing
//! Every stock mutation is paired with exactly one inventory row in the
//! same transaction:
//!
//! | Operation     | Stock          | Inventory row        |
//! |---------------|----------------|----------------------|
//! | create_order  | −qty (tracked) | `sale`, −qty         |
//! | void_order    | +qty per sale  | `return`, +qty       |
//! | adjust_stock  | ±delta         | `adjustment`, ±delta |
//!
//! Untracked products are never mutated and get no rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_core::order_number::{format_order_number, ORDER_SEQUENCE};
use settle_core::validation::validate_payment_amount;
use settle_core::{
    CoreError, InventoryReason, InventoryTransaction, Money, NewOrder, Order, OrderItem, Payment,
    PaymentMethod, PricedLine, PricedOrder, Product, ValidationError,
};
use settle_db::Database;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::audit::{sink_for, AuditSink, LogAuditSink, SettlementEvent};
use crate::config::EngineConfig;
use crate::error::SettleResult;
use crate::shift::ShiftAccumulator;

// =============================================================================
// Read Models
// =============================================================================

/// An order with everything hanging off it, for receipts and reports.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

impl OrderDetails {
    /// Σ payment amounts; equals `order.paid_amount` after any commit.
    pub fn payments_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }
}

/// Result of checking `initial_stock + Σ delta == stock_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockAudit {
    pub product_id: String,
    pub initial_stock: i64,
    pub net_delta: i64,
    pub stock_quantity: i64,
    pub consistent: bool,
}

// =============================================================================
// Engine
// =============================================================================

/// Settlement Engine.
///
/// Cheap to clone; clones share the pool and the audit sink.
#[derive(Clone)]
pub struct SettlementEngine {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    /// Creates an engine that logs audit events.
    pub fn new(db: Database) -> Self {
        SettlementEngine {
            db,
            audit: Arc::new(LogAuditSink),
        }
    }

    /// Replaces the audit sink.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Opens the configured database and wires the configured sink.
    pub async fn from_config(config: &EngineConfig) -> SettleResult<Self> {
        let db = Database::new(config.to_db_config()).await?;
        let audit = sink_for(config.audit.mode, &db);
        Ok(SettlementEngine { db, audit })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Shift Accumulator over the same database.
    pub fn shifts(&self) -> ShiftAccumulator {
        ShiftAccumulator::new(self.db.clone())
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates an order, reserving stock for every tracked line.
    ///
    /// All-or-nothing: an unknown product or a short line fails the whole
    /// request and nothing is written.
    ///
    /// ## Errors
    /// - `Validation` for an empty list, a non-positive quantity, or a
    ///   discount larger than the subtotal
    /// - `ProductNotFound`
    /// - `InsufficientStock`
    pub async fn create_order(&self, request: NewOrder) -> SettleResult<OrderDetails> {
        request.validate()?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        // Resolve and price every line before touching stock
        let mut products = Vec::with_capacity(request.lines.len());
        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product = uow
                .product(&line.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
            lines.push(PricedLine::price(&product, line.quantity)?);
            products.push(product);
        }
        let priced = PricedOrder::price(lines, request.discount_amount)?;

        // Reserve. The write lock is held, so the loaded stock is current;
        // `remaining` tracks it across repeated lines for the same product.
        let mut remaining: HashMap<&str, i64> = HashMap::new();
        for (line, product) in priced.lines.iter().zip(&products) {
            if !line.track_inventory {
                continue;
            }

            let on_hand = remaining
                .entry(product.id.as_str())
                .or_insert(product.stock_quantity);

            if !uow.reserve_stock(&line.product_id, line.quantity, now).await? {
                return Err(CoreError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    available: *on_hand,
                    requested: line.quantity,
                }
                .into());
            }

            let before = *on_hand;
            *on_hand -= line.quantity;
            warn_if_crossed_low_stock(product, before, *on_hand);
        }

        let seq = uow.next_sequence(ORDER_SEQUENCE).await?;
        let order_number = format_order_number(now, seq);

        let shift_id = match request.cashier_id.as_deref() {
            Some(cashier_id) => uow.open_shift_for(cashier_id).await?.map(|s| s.id),
            None => None,
        };

        let tracked: Vec<(String, i64)> = priced
            .lines
            .iter()
            .filter(|l| l.track_inventory)
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect();

        let order_id = Uuid::new_v4().to_string();
        let (order, items) = priced.into_order(
            order_id,
            order_number,
            &request,
            shift_id,
            now,
            || Uuid::new_v4().to_string(),
        );

        uow.insert_order(&order).await?;
        for item in &items {
            uow.insert_order_item(item).await?;
        }
        for (product_id, quantity) in tracked {
            uow.record_inventory(&inventory_row(
                product_id,
                -quantity,
                InventoryReason::Sale,
                Some(order.id.clone()),
                None,
                now,
            ))
            .await?;
        }

        uow.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            lines = items.len(),
            shift_id = ?order.shift_id,
            "Order created"
        );
        self.audit
            .notify(&SettlementEvent::order_created(&order, items.len()));

        Ok(OrderDetails {
            order,
            items,
            payments: Vec::new(),
        })
    }

    // =========================================================================
    // Pay
    // =========================================================================

    /// Records a payment and moves the order to `Processing` or `Completed`.
    ///
    /// `paid_amount` is re-summed from the payment rows inside the
    /// transaction, never incremented.
    pub async fn apply_payment(
        &self,
        order_id: &str,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> SettleResult<Order> {
        validate_payment_amount(amount)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let mut order = uow
            .order(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        order.ensure_accepts_payment()?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            amount,
            method,
            reference: reference
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            created_at: now,
        };
        uow.insert_payment(&payment).await?;

        let paid = uow.payments_total(&order.id).await?;
        order.apply_payment(amount, paid, now)?;
        uow.update_order_settlement(&order).await?;

        uow.commit().await?;

        info!(
            order_id = %order.id,
            method = ?method,
            amount = %amount,
            paid = %order.paid_amount,
            status = %order.status,
            change = %order.change_amount,
            "Payment applied"
        );
        self.audit
            .notify(&SettlementEvent::payment_applied(&order, &payment));

        Ok(order)
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Cancels a `Pending` or `Processing` order and returns its reserved
    /// stock. Payments are left as they are.
    ///
    /// A `Completed` order cannot be voided.
    pub async fn void_order(&self, order_id: &str, reason: &str) -> SettleResult<Order> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let mut order = uow
            .order(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        order.void(reason, now)?;

        // Reverse exactly what was reserved at creation
        let sales: Vec<InventoryTransaction> = uow
            .inventory_for_order(&order.id)
            .await?
            .into_iter()
            .filter(|t| t.reason == InventoryReason::Sale)
            .collect();

        let mut restored_units = 0;
        for sale in &sales {
            let quantity = -sale.quantity_delta;
            uow.restore_stock(&sale.product_id, quantity, now).await?;
            uow.record_inventory(&inventory_row(
                sale.product_id.clone(),
                quantity,
                InventoryReason::Return,
                Some(order.id.clone()),
                None,
                now,
            ))
            .await?;
            restored_units += quantity;
        }

        uow.update_order_settlement(&order).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            restored_units,
            reason = ?order.cancellation_reason,
            "Order voided"
        );
        self.audit
            .notify(&SettlementEvent::order_voided(&order, restored_units));

        Ok(order)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_order_details(&self, order_id: &str) -> SettleResult<OrderDetails> {
        let orders = self.db.orders();

        let order = orders
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        let items = orders.get_items(order_id).await?;
        let payments = orders.get_payments(order_id).await?;

        Ok(OrderDetails {
            order,
            items,
            payments,
        })
    }

    /// Orders stamped with the shift, cancelled ones included.
    pub async fn list_orders_for_shift(&self, shift_id: &str) -> SettleResult<Vec<Order>> {
        Ok(self.db.orders().list_for_shift(shift_id).await?)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Receives or writes off stock on a tracked product.
    ///
    /// Positive `delta` adds stock, negative removes it. Refuses to take a
    /// product below zero.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        note: Option<String>,
    ) -> SettleResult<Product> {
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "adjustment must not be zero".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let mut product = uow
            .product(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if !product.track_inventory {
            return Err(ValidationError::InvalidFormat {
                field: "product".to_string(),
                reason: "product does not track inventory".to_string(),
            }
            .into());
        }

        if !uow.adjust_stock(product_id, delta, now).await? {
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available: product.stock_quantity,
                requested: -delta,
            }
            .into());
        }

        uow.record_inventory(&inventory_row(
            product_id.to_string(),
            delta,
            InventoryReason::Adjustment,
            None,
            note,
            now,
        ))
        .await?;

        uow.commit().await?;

        let before = product.stock_quantity;
        product.stock_quantity += delta;
        product.updated_at = now;

        info!(
            product_id = %product.id,
            delta,
            stock = product.stock_quantity,
            "Stock adjusted"
        );
        warn_if_crossed_low_stock(&product, before, product.stock_quantity);

        Ok(product)
    }

    /// Inventory rows for a product, oldest first.
    pub async fn stock_history(&self, product_id: &str) -> SettleResult<Vec<InventoryTransaction>> {
        Ok(self.db.inventory().history(product_id).await?)
    }

    /// Checks the product's stock against its inventory log.
    pub async fn verify_stock_conservation(&self, product_id: &str) -> SettleResult<StockAudit> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let net_delta = self.db.inventory().net_delta(product_id).await?;

        let audit = StockAudit {
            product_id: product.id,
            initial_stock: product.initial_stock,
            net_delta,
            stock_quantity: product.stock_quantity,
            consistent: product.initial_stock + net_delta == product.stock_quantity,
        };

        if !audit.consistent {
            warn!(
                product_id = %audit.product_id,
                initial = audit.initial_stock,
                net_delta = audit.net_delta,
                stock = audit.stock_quantity,
                "Stock does not match inventory log"
            );
        }

        Ok(audit)
    }

    /// Tracked products at or below their low-stock threshold.
    pub async fn low_stock(&self) -> SettleResult<Vec<Product>> {
        Ok(self.db.products().list_low_stock().await?)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn inventory_row(
    product_id: String,
    quantity_delta: i64,
    reason: InventoryReason,
    order_id: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
) -> InventoryTransaction {
    InventoryTransaction {
        id: Uuid::new_v4().to_string(),
        product_id,
        quantity_delta,
        reason,
        order_id,
        note,
        created_at,
    }
}

fn warn_if_crossed_low_stock(product: &Product, before: i64, after: i64) {
    let threshold = product.low_stock_threshold;
    if before > threshold && after <= threshold {
        warn!(
            product_id = %product.id,
            sku = %product.sku,
            stock = after,
            threshold,
            "Product reached low stock"
        );
    } else {
        debug!(product_id = %product.id, stock = after, "Stock updated");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{NoopAuditSink, OutboxAuditSink};
    use crate::error::SettleError;
    use settle_core::{OrderLine, OrderStatus, OrderType};
    use settle_db::DbConfig;
    use std::sync::Mutex;

    /// Collects events for assertions.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<SettlementEvent>>,
    }

    impl AuditSink for RecordingSink {
        fn notify(&self, event: &SettlementEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn product(id: &str, ex_gst: i64, gst: i64, stock: i64, tracked: bool) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            sku: id.to_uppercase(),
            name: format!("Product {}", id),
            price_ex_gst: Money::from_cents(ex_gst),
            gst_amount: Money::from_cents(gst),
            stock_quantity: stock,
            initial_stock: stock,
            track_inventory: tracked,
            low_stock_threshold: 1,
            created_at: now,
            updated_at: now,
        }
    }

    async fn engine_with(products: &[Product]) -> SettlementEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for p in products {
            db.products().insert(p).await.unwrap();
        }
        SettlementEngine::new(db).with_audit_sink(Arc::new(NoopAuditSink))
    }

    fn one_line(product_id: &str, quantity: i64) -> NewOrder {
        NewOrder::new(OrderType::Retail, vec![OrderLine::new(product_id, quantity)])
    }

    fn domain(err: SettleError) -> CoreError {
        match err {
            SettleError::Domain(e) => e,
            other => panic!("expected domain error, got {:?}", other),
        }
    }

    async fn stock_of(engine: &SettlementEngine, id: &str) -> i64 {
        engine
            .database()
            .products()
            .get_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    // -------------------------------------------------------------------------
    // create_order
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_prices_from_components() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;

        let details = engine.create_order(one_line("p-1", 3)).await.unwrap();
        let order = &details.order;

        assert_eq!(order.sub_total, Money::from_cents(2727));
        assert_eq!(order.tax_amount, Money::from_cents(273));
        assert_eq!(order.total_amount, Money::from_cents(3000));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.paid_amount, Money::zero());
        assert!(order.totals_consistent(&details.items));
        assert!(order.order_number.starts_with("ORD-"));

        assert_eq!(stock_of(&engine, "p-1").await, 7);
        let history = engine.stock_history("p-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].quantity_delta, -3);
        assert_eq!(history[0].reason, InventoryReason::Sale);
        assert_eq!(history[0].order_id.as_deref(), Some(order.id.as_str()));
    }

    #[tokio::test]
    async fn test_create_applies_discount() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;

        let request = one_line("p-1", 3).with_discount(Money::from_cents(500));
        let order = engine.create_order(request).await.unwrap().order;

        assert_eq!(order.discount_amount, Money::from_cents(500));
        assert_eq!(order.total_amount, Money::from_cents(2500));
        assert_eq!(
            order.total_amount,
            order.sub_total - order.discount_amount + order.tax_amount
        );
    }

    #[tokio::test]
    async fn test_create_insufficient_stock_writes_nothing() {
        let engine = engine_with(&[product("p-1", 909, 91, 2, true)]).await;

        let err = domain(engine.create_order(one_line("p-1", 100)).await.unwrap_err());
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 2,
                requested: 100,
                ..
            }
        ));

        assert_eq!(stock_of(&engine, "p-1").await, 2);
        assert_eq!(engine.database().inventory().count().await.unwrap(), 0);
        assert_eq!(engine.database().orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rolls_back_earlier_reservations() {
        let engine = engine_with(&[
            product("p-1", 909, 91, 10, true),
            product("p-2", 909, 91, 1, true),
        ])
        .await;

        let request = NewOrder::new(
            OrderType::Retail,
            vec![OrderLine::new("p-1", 4), OrderLine::new("p-2", 2)],
        );
        let err = domain(engine.create_order(request).await.unwrap_err());
        assert!(matches!(err, CoreError::InsufficientStock { .. }));

        assert_eq!(stock_of(&engine, "p-1").await, 10);
        assert_eq!(stock_of(&engine, "p-2").await, 1);
        assert_eq!(engine.database().inventory().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_repeated_product_lines_share_stock() {
        let engine = engine_with(&[product("p-1", 100, 10, 5, true)]).await;

        let request = NewOrder::new(
            OrderType::Retail,
            vec![OrderLine::new("p-1", 3), OrderLine::new("p-1", 3)],
        );
        let err = domain(engine.create_order(request).await.unwrap_err());
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            }
        ));
        assert_eq!(stock_of(&engine, "p-1").await, 5);
    }

    #[tokio::test]
    async fn test_create_unknown_product() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;

        let request = NewOrder::new(
            OrderType::Retail,
            vec![OrderLine::new("p-1", 1), OrderLine::new("ghost", 1)],
        );
        let err = domain(engine.create_order(request).await.unwrap_err());
        assert!(matches!(err, CoreError::ProductNotFound(id) if id == "ghost"));

        assert_eq!(stock_of(&engine, "p-1").await, 10);
        assert_eq!(engine.database().orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_and_zero_quantity() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;

        let empty = NewOrder::new(OrderType::Retail, vec![]);
        assert!(matches!(
            domain(engine.create_order(empty).await.unwrap_err()),
            CoreError::Validation(_)
        ));

        assert!(matches!(
            domain(engine.create_order(one_line("p-1", 0)).await.unwrap_err()),
            CoreError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_untracked_product_is_never_mutated() {
        let engine = engine_with(&[product("svc", 500, 50, 0, false)]).await;

        let order = engine.create_order(one_line("svc", 4)).await.unwrap().order;
        assert_eq!(stock_of(&engine, "svc").await, 0);
        assert!(engine.stock_history("svc").await.unwrap().is_empty());

        engine.void_order(&order.id, "mistake").await.unwrap();
        assert_eq!(stock_of(&engine, "svc").await, 0);
        assert!(engine.stock_history("svc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_numbers_are_unique_and_increasing() {
        let engine = engine_with(&[product("p-1", 100, 10, 50, true)]).await;

        let a = engine.create_order(one_line("p-1", 1)).await.unwrap().order;
        let b = engine.create_order(one_line("p-1", 1)).await.unwrap().order;

        assert_ne!(a.order_number, b.order_number);
        assert!(a.order_number.ends_with("000001"));
        assert!(b.order_number.ends_with("000002"));
    }

    #[tokio::test]
    async fn test_create_stamps_open_shift() {
        let engine = engine_with(&[product("p-1", 100, 10, 50, true)]).await;
        let shift = engine
            .shifts()
            .open_shift("cashier-1", "store-1", Money::from_cents(10_000))
            .await
            .unwrap();

        let with_shift = engine
            .create_order(one_line("p-1", 1).with_cashier("cashier-1"))
            .await
            .unwrap()
            .order;
        let other_cashier = engine
            .create_order(one_line("p-1", 1).with_cashier("cashier-2"))
            .await
            .unwrap()
            .order;

        assert_eq!(with_shift.shift_id.as_deref(), Some(shift.id.as_str()));
        assert_eq!(other_cashier.shift_id, None);
        assert_eq!(engine.list_orders_for_shift(&shift.id).await.unwrap().len(), 1);
    }

    // -------------------------------------------------------------------------
    // apply_payment
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_partial_then_settling_payment() {
        // 10 × $10.00 = $100.00
        let engine = engine_with(&[product("p-1", 909, 91, 20, true)]).await;
        let order = engine.create_order(one_line("p-1", 10)).await.unwrap().order;
        assert_eq!(order.total_amount, Money::from_cents(10_000));

        let after_first = engine
            .apply_payment(&order.id, Money::from_cents(5_000), PaymentMethod::Cash, None)
            .await
            .unwrap();
        assert_eq!(after_first.status, OrderStatus::Processing);
        assert_eq!(after_first.paid_amount, Money::from_cents(5_000));
        assert_eq!(after_first.change_amount, Money::zero());

        let after_second = engine
            .apply_payment(
                &order.id,
                Money::from_cents(7_000),
                PaymentMethod::CreditCard,
                Some("AUTH-42".into()),
            )
            .await
            .unwrap();
        assert_eq!(after_second.status, OrderStatus::Completed);
        assert_eq!(after_second.paid_amount, Money::from_cents(12_000));
        assert_eq!(after_second.change_amount, Money::from_cents(2_000));
        assert!(after_second.completed_at.is_some());

        let details = engine.get_order_details(&order.id).await.unwrap();
        assert_eq!(details.payments.len(), 2);
        assert_eq!(details.payments_total(), details.order.paid_amount);
        assert_eq!(details.payments[1].reference.as_deref(), Some("AUTH-42"));
        // payments do not touch stock
        assert_eq!(stock_of(&engine, "p-1").await, 10);
    }

    #[tokio::test]
    async fn test_payment_on_completed_order_rejected() {
        let engine = engine_with(&[product("p-1", 909, 91, 20, true)]).await;
        let order = engine.create_order(one_line("p-1", 1)).await.unwrap().order;

        engine
            .apply_payment(&order.id, Money::from_cents(1_000), PaymentMethod::Cash, None)
            .await
            .unwrap();
        let err = domain(
            engine
                .apply_payment(&order.id, Money::from_cents(100), PaymentMethod::Cash, None)
                .await
                .unwrap_err(),
        );
        assert!(matches!(
            err,
            CoreError::InvalidOrderState {
                status: OrderStatus::Completed,
                ..
            }
        ));

        let details = engine.get_order_details(&order.id).await.unwrap();
        assert_eq!(details.payments.len(), 1);
        assert_eq!(details.order.paid_amount, Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn test_payment_missing_order_and_bad_amount() {
        let engine = engine_with(&[product("p-1", 909, 91, 20, true)]).await;

        let err = domain(
            engine
                .apply_payment("nope", Money::from_cents(100), PaymentMethod::Cash, None)
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, CoreError::OrderNotFound(_)));

        let order = engine.create_order(one_line("p-1", 1)).await.unwrap().order;
        let err = domain(
            engine
                .apply_payment(&order.id, Money::zero(), PaymentMethod::Cash, None)
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(
            engine.database().orders().get_total_paid(&order.id).await.unwrap(),
            Money::zero()
        );
    }

    #[tokio::test]
    async fn test_payment_on_cancelled_order_rejected() {
        let engine = engine_with(&[product("p-1", 909, 91, 20, true)]).await;
        let order = engine.create_order(one_line("p-1", 1)).await.unwrap().order;
        engine.void_order(&order.id, "wrong table").await.unwrap();

        let err = domain(
            engine
                .apply_payment(&order.id, Money::from_cents(1_000), PaymentMethod::Cash, None)
                .await
                .unwrap_err(),
        );
        assert!(matches!(
            err,
            CoreError::InvalidOrderState {
                status: OrderStatus::Cancelled,
                ..
            }
        ));
    }

    // -------------------------------------------------------------------------
    // void_order
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_void_pending_restores_stock() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;
        let order = engine.create_order(one_line("p-1", 5)).await.unwrap().order;
        assert_eq!(stock_of(&engine, "p-1").await, 5);

        let voided = engine.void_order(&order.id, "customer left").await.unwrap();
        assert_eq!(voided.status, OrderStatus::Cancelled);
        assert!(voided.cancelled_at.is_some());
        assert_eq!(voided.cancellation_reason.as_deref(), Some("customer left"));

        assert_eq!(stock_of(&engine, "p-1").await, 10);
        let returns: Vec<_> = engine
            .stock_history("p-1")
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.reason == InventoryReason::Return)
            .collect();
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].quantity_delta, 5);
    }

    #[tokio::test]
    async fn test_void_processing_keeps_payments() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;
        let order = engine.create_order(one_line("p-1", 2)).await.unwrap().order;
        engine
            .apply_payment(&order.id, Money::from_cents(500), PaymentMethod::Cash, None)
            .await
            .unwrap();

        engine.void_order(&order.id, "card declined").await.unwrap();

        let details = engine.get_order_details(&order.id).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::Cancelled);
        assert_eq!(details.payments.len(), 1);
        assert_eq!(details.order.paid_amount, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_void_twice_rejected_without_change() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;
        let order = engine.create_order(one_line("p-1", 5)).await.unwrap().order;
        engine.void_order(&order.id, "first").await.unwrap();

        let err = domain(engine.void_order(&order.id, "second").await.unwrap_err());
        assert!(matches!(
            err,
            CoreError::InvalidOrderState {
                status: OrderStatus::Cancelled,
                ..
            }
        ));

        assert_eq!(stock_of(&engine, "p-1").await, 10);
        assert_eq!(engine.stock_history("p-1").await.unwrap().len(), 2);
        let order = engine.get_order_details(&order.id).await.unwrap().order;
        assert_eq!(order.cancellation_reason.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_void_completed_rejected() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;
        let order = engine.create_order(one_line("p-1", 1)).await.unwrap().order;
        engine
            .apply_payment(&order.id, Money::from_cents(1_000), PaymentMethod::Cash, None)
            .await
            .unwrap();

        let err = domain(engine.void_order(&order.id, "regret").await.unwrap_err());
        assert!(matches!(
            err,
            CoreError::InvalidOrderState {
                status: OrderStatus::Completed,
                ..
            }
        ));
        assert_eq!(stock_of(&engine, "p-1").await, 9);
    }

    #[tokio::test]
    async fn test_void_after_product_untracked_restores_sold_units() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;
        let order = engine.create_order(one_line("p-1", 5)).await.unwrap().order;

        engine
            .database()
            .products()
            .set_track_inventory("p-1", false)
            .await
            .unwrap();

        let voided = engine.void_order(&order.id, "stock count fix").await.unwrap();
        assert_eq!(voided.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&engine, "p-1").await, 10);

        let audit = engine.verify_stock_conservation("p-1").await.unwrap();
        assert_eq!(audit.net_delta, 0);
        assert!(audit.consistent);
    }

    #[tokio::test]
    async fn test_void_missing_order_and_blank_reason() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;

        let err = domain(engine.void_order("nope", "reason").await.unwrap_err());
        assert!(matches!(err, CoreError::OrderNotFound(_)));

        let order = engine.create_order(one_line("p-1", 1)).await.unwrap().order;
        let err = domain(engine.void_order(&order.id, "   ").await.unwrap_err());
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(stock_of(&engine, "p-1").await, 9);
    }

    // -------------------------------------------------------------------------
    // Stock ledger
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_stock_conservation_across_operations() {
        let engine = engine_with(&[product("p-1", 909, 91, 10, true)]).await;

        let a = engine.create_order(one_line("p-1", 3)).await.unwrap().order;
        engine.create_order(one_line("p-1", 2)).await.unwrap();
        engine.void_order(&a.id, "duplicate").await.unwrap();
        engine
            .adjust_stock("p-1", 6, Some("delivery".into()))
            .await
            .unwrap();
        engine.adjust_stock("p-1", -1, None).await.unwrap();

        let audit = engine.verify_stock_conservation("p-1").await.unwrap();
        assert!(audit.consistent);
        assert_eq!(audit.initial_stock, 10);
        assert_eq!(audit.net_delta, 3);
        assert_eq!(audit.stock_quantity, 13);
    }

    #[tokio::test]
    async fn test_adjust_stock_guards() {
        let engine = engine_with(&[
            product("p-1", 909, 91, 3, true),
            product("svc", 500, 50, 0, false),
        ])
        .await;

        let err = domain(engine.adjust_stock("p-1", -4, None).await.unwrap_err());
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
        assert_eq!(stock_of(&engine, "p-1").await, 3);

        assert!(matches!(
            domain(engine.adjust_stock("svc", 5, None).await.unwrap_err()),
            CoreError::Validation(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            domain(engine.adjust_stock("p-1", 0, None).await.unwrap_err()),
            CoreError::Validation(_)
        ));
        assert!(matches!(
            domain(engine.adjust_stock("ghost", 1, None).await.unwrap_err()),
            CoreError::ProductNotFound(_)
        ));

        let product = engine.adjust_stock("p-1", -3, None).await.unwrap();
        assert_eq!(product.stock_quantity, 0);
        let history = engine.stock_history("p-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, InventoryReason::Adjustment);
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        // threshold is 1
        let engine = engine_with(&[
            product("p-1", 909, 91, 3, true),
            product("p-2", 909, 91, 10, true),
        ])
        .await;

        assert!(engine.low_stock().await.unwrap().is_empty());
        engine.create_order(one_line("p-1", 2)).await.unwrap();

        let low = engine.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, "p-1");
    }

    // -------------------------------------------------------------------------
    // Audit
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_audit_events_follow_commits() {
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_with(&[product("p-1", 909, 91, 2, true)])
            .await
            .with_audit_sink(sink.clone());

        let order = engine.create_order(one_line("p-1", 1)).await.unwrap().order;
        engine
            .apply_payment(&order.id, Money::from_cents(400), PaymentMethod::Cash, None)
            .await
            .unwrap();
        engine.void_order(&order.id, "changed mind").await.unwrap();
        // rejected operations notify nothing
        engine.create_order(one_line("p-1", 50)).await.unwrap_err();

        let types: Vec<&str> = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect();
        assert_eq!(types, vec!["order_created", "payment_applied", "order_voided"]);
    }

    #[tokio::test]
    async fn test_outbox_sink_records_events() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .insert(&product("p-1", 909, 91, 5, true))
            .await
            .unwrap();
        let sink = Arc::new(OutboxAuditSink::new(db.audit_outbox()));
        let engine = SettlementEngine::new(db).with_audit_sink(sink.clone());

        let order = engine.create_order(one_line("p-1", 1)).await.unwrap().order;
        sink.flush().await;

        let entries = engine
            .database()
            .audit_outbox()
            .for_order(&order.id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "order_created");
    }

    // -------------------------------------------------------------------------
    // Concurrency
    // -------------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_for_last_unit() {
        let path = std::env::temp_dir().join(format!("settle-race-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        db.products()
            .insert(&product("last", 909, 91, 1, true))
            .await
            .unwrap();
        let engine = SettlementEngine::new(db).with_audit_sink(Arc::new(NoopAuditSink));

        let a = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.create_order(one_line("last", 1)).await })
        };
        let b = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.create_order(one_line("last", 1)).await })
        };
        let results = vec![a.await.unwrap(), b.await.unwrap()];

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let loser = results.into_iter().find_map(|r| r.err()).unwrap();
        assert!(matches!(
            domain(loser),
            CoreError::InsufficientStock {
                available: 0,
                requested: 1,
                ..
            }
        ));

        assert_eq!(stock_of(&engine, "last").await, 0);
        assert!(engine.verify_stock_conservation("last").await.unwrap().consistent);

        engine.database().close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            std::fs::remove_file(file).ok();
        }
    }
}
