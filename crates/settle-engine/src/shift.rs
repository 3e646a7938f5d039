//! # Shift Accumulator
//!
//! Cashier shift sessions and their cash reconciliation.
//!
//! ```text
//! open_shift(cashier, store, float)      one open shift per cashier
//!      │
//!      ▼
//! create_order(.. cashier ..)            stamps shift_id at creation
//!      │
//!      ▼
//! summarize(shift_id)                    read-only, repeatable
//!      │
//!      ▼
//! close_shift(shift_id, counted cash)    refreshes total_sales/total_orders,
//!                                        returns cash_difference
//! ```

use chrono::Utc;
use settle_core::validation::{validate_cash_count, validate_required};
use settle_core::{CoreError, Money, Shift, ShiftStatus, ShiftSummary};
use settle_db::Database;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SettleResult;

/// Shift Accumulator.
#[derive(Debug, Clone)]
pub struct ShiftAccumulator {
    db: Database,
}

impl ShiftAccumulator {
    pub fn new(db: Database) -> Self {
        ShiftAccumulator { db }
    }

    /// Opens a shift with the given cash float.
    ///
    /// Fails with `ShiftAlreadyOpen` if the cashier has one.
    pub async fn open_shift(
        &self,
        cashier_id: &str,
        store_id: &str,
        starting_cash: Money,
    ) -> SettleResult<Shift> {
        let cashier_id = validate_required("cashier id", cashier_id)?;
        let store_id = validate_required("store id", store_id)?;
        validate_cash_count("starting cash", starting_cash)?;

        let mut uow = self.db.begin().await?;

        if let Some(open) = uow.open_shift_for(&cashier_id).await? {
            return Err(CoreError::ShiftAlreadyOpen {
                cashier_id,
                shift_id: open.id,
            }
            .into());
        }

        let shift = Shift {
            id: Uuid::new_v4().to_string(),
            cashier_id,
            store_id,
            status: ShiftStatus::Open,
            starting_cash,
            ending_cash: None,
            total_sales: Money::zero(),
            total_orders: 0,
            opened_at: Utc::now(),
            closed_at: None,
        };
        uow.insert_shift(&shift).await?;
        uow.commit().await?;

        info!(
            shift_id = %shift.id,
            cashier_id = %shift.cashier_id,
            starting_cash = %shift.starting_cash,
            "Shift opened"
        );

        Ok(shift)
    }

    /// Current reconciliation for a shift. Writes nothing.
    pub async fn summarize(&self, shift_id: &str) -> SettleResult<ShiftSummary> {
        let shift = self
            .db
            .shifts()
            .get_by_id(shift_id)
            .await?
            .ok_or_else(|| CoreError::ShiftNotFound(shift_id.to_string()))?;

        let orders = self.db.orders().list_for_shift(shift_id).await?;
        let payments = self.db.orders().payments_for_shift(shift_id).await?;

        Ok(ShiftSummary::compute(&shift, &orders, &payments))
    }

    /// Recomputes the denormalised `total_sales`/`total_orders` columns.
    pub async fn refresh_totals(&self, shift_id: &str) -> SettleResult<Shift> {
        let mut uow = self.db.begin().await?;

        let mut shift = uow
            .shift(shift_id)
            .await?
            .ok_or_else(|| CoreError::ShiftNotFound(shift_id.to_string()))?;
        let orders = uow.orders_for_shift(shift_id).await?;
        let payments = uow.payments_for_shift(shift_id).await?;
        let summary = ShiftSummary::compute(&shift, &orders, &payments);

        uow.refresh_shift_totals(shift_id, summary.total_sales, summary.total_orders)
            .await?;
        uow.commit().await?;

        shift.total_sales = summary.total_sales;
        shift.total_orders = summary.total_orders;
        Ok(shift)
    }

    /// Closes a shift against the counted drawer and returns the final
    /// reconciliation.
    pub async fn close_shift(&self, shift_id: &str, ending_cash: Money) -> SettleResult<ShiftSummary> {
        validate_cash_count("ending cash", ending_cash)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let mut shift = uow
            .shift(shift_id)
            .await?
            .ok_or_else(|| CoreError::ShiftNotFound(shift_id.to_string()))?;
        if shift.status == ShiftStatus::Closed {
            return Err(CoreError::ShiftClosed(shift_id.to_string()).into());
        }

        let orders = uow.orders_for_shift(shift_id).await?;
        let payments = uow.payments_for_shift(shift_id).await?;

        shift.status = ShiftStatus::Closed;
        shift.ending_cash = Some(ending_cash);
        shift.closed_at = Some(now);
        let summary = ShiftSummary::compute(&shift, &orders, &payments);

        uow.refresh_shift_totals(shift_id, summary.total_sales, summary.total_orders)
            .await?;
        uow.close_shift(shift_id, ending_cash, now).await?;
        uow.commit().await?;

        info!(
            shift_id = %shift.id,
            total_sales = %summary.total_sales,
            orders = summary.total_orders,
            expected_cash = %summary.expected_cash,
            "Shift closed"
        );
        if !summary.is_balanced() {
            warn!(
                shift_id = %shift.id,
                difference = ?summary.cash_difference,
                "Cash drawer does not balance"
            );
        }

        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
