//! # Unit of Work
//!
//! One storage transaction per settlement operation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = db.begin().await?;      BEGIN IMMEDIATE                  │
//! │                                                                         │
//! │  uow.reserve_stock(..)?;               any `?` here drops `uow`         │
//! │  uow.record_inventory(..)?;            and the transaction rolls back   │
//! │  uow.insert_order(..)?;                                                 │
//! │                                                                         │
//! │  uow.commit().await?;                  COMMIT: all rows visible at once │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There are no partial writes: stock, inventory rows, order, items and
//! payments commit together or not at all.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};

use crate::error::DbResult;
use crate::repository::{inventory, order, product, sequence, shift};
use settle_core::{InventoryTransaction, Money, Order, OrderItem, Payment, Product, Shift};

/// An open write transaction.
///
/// Dropping it without calling [`commit`](UnitOfWork::commit) rolls back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").finish_non_exhaustive()
    }
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        UnitOfWork { tx }
    }

    /// Commits every write made through this unit of work.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Rolls back explicitly. Dropping has the same effect.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    // =========================================================================
    // Products / stock ledger
    // =========================================================================

    pub async fn product(&mut self, id: &str) -> DbResult<Option<Product>> {
        product::fetch_by_id(&mut self.tx, id).await
    }

    /// Conditional decrement of tracked stock. `false` means not enough on
    /// hand (or the product is untracked) and nothing changed.
    pub async fn reserve_stock(
        &mut self,
        product_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        product::reserve(&mut self.tx, product_id, quantity, now).await
    }

    pub async fn restore_stock(
        &mut self,
        product_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        product::restore(&mut self.tx, product_id, quantity, now).await
    }

    /// Signed change to tracked stock; `false` if it would go negative.
    pub async fn adjust_stock(
        &mut self,
        product_id: &str,
        delta: i64,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        product::adjust(&mut self.tx, product_id, delta, now).await
    }

    // =========================================================================
    // Inventory log
    // =========================================================================

    pub async fn record_inventory(&mut self, entry: &InventoryTransaction) -> DbResult<()> {
        inventory::insert(&mut self.tx, entry).await
    }

    pub async fn inventory_for_order(&mut self, order_id: &str) -> DbResult<Vec<InventoryTransaction>> {
        inventory::for_order(&mut self.tx, order_id).await
    }

    // =========================================================================
    // Orders / payments
    // =========================================================================

    pub async fn next_sequence(&mut self, name: &str) -> DbResult<i64> {
        sequence::next_value(&mut self.tx, name).await
    }

    pub async fn insert_order(&mut self, order: &Order) -> DbResult<()> {
        order::insert_order(&mut self.tx, order).await
    }

    pub async fn insert_order_item(&mut self, item: &OrderItem) -> DbResult<()> {
        order::insert_item(&mut self.tx, item).await
    }

    pub async fn order(&mut self, id: &str) -> DbResult<Option<Order>> {
        order::fetch_order(&mut self.tx, id).await
    }

    pub async fn order_items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        order::fetch_items(&mut self.tx, order_id).await
    }

    /// Persists status, paid/change amounts and lifecycle timestamps.
    pub async fn update_order_settlement(&mut self, order: &Order) -> DbResult<()> {
        order::update_settlement(&mut self.tx, order).await
    }

    pub async fn insert_payment(&mut self, payment: &Payment) -> DbResult<()> {
        order::insert_payment(&mut self.tx, payment).await
    }

    /// Σ payments for the order as of this transaction, including any
    /// payment inserted earlier in it.
    pub async fn payments_total(&mut self, order_id: &str) -> DbResult<Money> {
        order::payments_total(&mut self.tx, order_id).await
    }

    // =========================================================================
    // Shifts
    // =========================================================================

    pub async fn shift(&mut self, id: &str) -> DbResult<Option<Shift>> {
        shift::fetch(&mut self.tx, id).await
    }

    pub async fn open_shift_for(&mut self, cashier_id: &str) -> DbResult<Option<Shift>> {
        shift::open_for_cashier(&mut self.tx, cashier_id).await
    }

    pub async fn insert_shift(&mut self, new_shift: &Shift) -> DbResult<()> {
        shift::insert(&mut self.tx, new_shift).await
    }

    pub async fn orders_for_shift(&mut self, shift_id: &str) -> DbResult<Vec<Order>> {
        order::orders_for_shift(&mut self.tx, shift_id).await
    }

    pub async fn payments_for_shift(&mut self, shift_id: &str) -> DbResult<Vec<Payment>> {
        order::payments_for_shift(&mut self.tx, shift_id).await
    }

    pub async fn refresh_shift_totals(
        &mut self,
        shift_id: &str,
        total_sales: Money,
        total_orders: i64,
    ) -> DbResult<()> {
        shift::refresh_totals(&mut self.tx, shift_id, total_sales, total_orders).await
    }

    pub async fn close_shift(
        &mut self,
        shift_id: &str,
        ending_cash: Money,
        closed_at: DateTime<Utc>,
    ) -> DbResult<()> {
        shift::close(&mut self.tx, shift_id, ending_cash, closed_at).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use settle_core::{InventoryReason, InventoryTransaction, Money, Product};

    async fn db_with_product(stock: i64) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: "p-1".to_string(),
                sku: "P1".to_string(),
                name: "Widget".to_string(),
                price_ex_gst: Money::from_cents(909),
                gst_amount: Money::from_cents(91),
                stock_quantity: stock,
                initial_stock: stock,
                track_inventory: true,
                low_stock_threshold: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        db
    }

    fn sale_row(delta: i64) -> InventoryTransaction {
        InventoryTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: "p-1".to_string(),
            quantity_delta: delta,
            reason: InventoryReason::Sale,
            order_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let db = db_with_product(10).await;

        let mut uow = db.begin().await.unwrap();
        assert!(uow.reserve_stock("p-1", 4, Utc::now()).await.unwrap());
        uow.record_inventory(&sale_row(-4)).await.unwrap();
        uow.commit().await.unwrap();

        let product = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 6);
        assert_eq!(db.inventory().net_delta("p-1").await.unwrap(), -4);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = db_with_product(10).await;

        {
            let mut uow = db.begin().await.unwrap();
            assert!(uow.reserve_stock("p-1", 4, Utc::now()).await.unwrap());
            uow.record_inventory(&sale_row(-4)).await.unwrap();
            // dropped without commit
        }

        let product = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 10);
        assert_eq!(db.inventory().count().await.unwrap(), 0);
    }
}
