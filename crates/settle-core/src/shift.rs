//! # Shift Reconciliation
//!
//! Pure arithmetic over a shift's orders and payments. Storage loads the
//! rows, this module turns them into a [`ShiftSummary`].
//!
//! ## Cash Drawer Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  starting_cash (float counted at open)                                 │
//! │     + Σ cash payments on non-cancelled orders                          │
//! │     − Σ change handed back (change is always cash)                     │
//! │     ─────────────────────────────────────────                          │
//! │     = expected_cash                                                    │
//! │                                                                         │
//! │  closed shift:  cash_difference = ending_cash − expected_cash          │
//! │                 (> 0 over, < 0 short)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::status::OrderStatus;
use crate::types::{Order, Payment, PaymentMethod, Shift, ShiftStatus};

/// Derived totals for one shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSummary {
    pub shift_id: String,
    pub status: ShiftStatus,
    /// Σ total_amount of non-cancelled orders.
    pub total_sales: Money,
    /// Count of non-cancelled orders.
    pub total_orders: i64,
    /// Cash taken less change given.
    pub cash_sales: Money,
    pub card_sales: Money,
    pub other_sales: Money,
    pub change_given: Money,
    pub starting_cash: Money,
    pub expected_cash: Money,
    pub ending_cash: Option<Money>,
    /// Present only once the shift is closed.
    pub cash_difference: Option<Money>,
}

impl ShiftSummary {
    /// Summarizes a shift from its orders and the payments on them.
    ///
    /// `orders` may include cancelled orders and `payments` may include
    /// rows for orders outside the shift; both are filtered here.
    pub fn compute(shift: &Shift, orders: &[Order], payments: &[Payment]) -> Self {
        let counted: Vec<&Order> = orders
            .iter()
            .filter(|o| o.shift_id.as_deref() == Some(shift.id.as_str()))
            .filter(|o| o.status != OrderStatus::Cancelled)
            .collect();

        let ids: HashSet<&str> = counted.iter().map(|o| o.id.as_str()).collect();

        let mut cash_payments = Money::zero();
        let mut card_sales = Money::zero();
        let mut other_sales = Money::zero();

        for payment in payments.iter().filter(|p| ids.contains(p.order_id.as_str())) {
            if payment.method == PaymentMethod::Cash {
                cash_payments += payment.amount;
            } else if payment.method.is_card() {
                card_sales += payment.amount;
            } else {
                other_sales += payment.amount;
            }
        }

        let total_sales: Money = counted.iter().map(|o| o.total_amount).sum();
        let change_given: Money = counted.iter().map(|o| o.change_amount).sum();
        let cash_sales = cash_payments - change_given;
        let expected_cash = shift.starting_cash + cash_sales;

        let cash_difference = match (shift.status, shift.ending_cash) {
            (ShiftStatus::Closed, Some(ending)) => Some(ending - expected_cash),
            _ => None,
        };

        ShiftSummary {
            shift_id: shift.id.clone(),
            status: shift.status,
            total_sales,
            total_orders: counted.len() as i64,
            cash_sales,
            card_sales,
            other_sales,
            change_given,
            starting_cash: shift.starting_cash,
            expected_cash,
            ending_cash: shift.ending_cash,
            cash_difference,
        }
    }

    /// True when the counted drawer matches the expected cash exactly.
    pub fn is_balanced(&self) -> bool {
        self.cash_difference.map_or(false, |d| d.is_zero())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderType;
    use chrono::Utc;

    fn shift(status: ShiftStatus, starting: i64, ending: Option<i64>) -> Shift {
        Shift {
            id: "shift-1".to_string(),
            cashier_id: "cashier-1".to_string(),
            store_id: "store-1".to_string(),
            status,
            starting_cash: Money::from_cents(starting),
            ending_cash: ending.map(Money::from_cents),
            total_sales: Money::zero(),
            total_orders: 0,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    fn order(id: &str, status: OrderStatus, total: i64, paid: i64, change: i64) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            order_number: format!("ORD-{}", id),
            status,
            order_type: OrderType::Retail,
            customer_id: None,
            table_number: None,
            store_id: None,
            cashier_id: Some("cashier-1".to_string()),
            shift_id: Some("shift-1".to_string()),
            sub_total: Money::from_cents(total),
            discount_amount: Money::zero(),
            tax_amount: Money::zero(),
            total_amount: Money::from_cents(total),
            paid_amount: Money::from_cents(paid),
            change_amount: Money::from_cents(change),
            cancellation_reason: None,
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(order_id: &str, amount: i64, method: PaymentMethod) -> Payment {
        Payment {
            id: format!("pay-{}-{}", order_id, amount),
            order_id: order_id.to_string(),
            amount: Money::from_cents(amount),
            method,
            reference: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cancelled_orders_excluded() {
        let s = shift(ShiftStatus::Open, 10000, None);
        let orders = vec![
            order("a", OrderStatus::Completed, 3000, 3000, 0),
            order("b", OrderStatus::Cancelled, 5000, 0, 0),
            order("c", OrderStatus::Pending, 2000, 0, 0),
        ];
        let summary = ShiftSummary::compute(&s, &orders, &[]);

        assert_eq!(summary.total_orders, 2);
        assert_eq!(summary.total_sales.cents(), 5000);
        assert!(summary.cash_difference.is_none());
    }

    #[test]
    fn test_payment_split_and_expected_cash() {
        let s = shift(ShiftStatus::Closed, 10000, Some(22000));
        let orders = vec![
            order("a", OrderStatus::Completed, 10000, 12000, 2000),
            order("b", OrderStatus::Completed, 5000, 5000, 0),
            order("x", OrderStatus::Cancelled, 4000, 1000, 0),
        ];
        let payments = vec![
            payment("a", 5000, PaymentMethod::Cash),
            payment("a", 7000, PaymentMethod::Cash),
            payment("b", 3000, PaymentMethod::CreditCard),
            payment("b", 2000, PaymentMethod::DigitalWallet),
            payment("x", 1000, PaymentMethod::Cash),
        ];

        let summary = ShiftSummary::compute(&s, &orders, &payments);

        assert_eq!(summary.change_given.cents(), 2000);
        assert_eq!(summary.cash_sales.cents(), 10000);
        assert_eq!(summary.card_sales.cents(), 3000);
        assert_eq!(summary.other_sales.cents(), 2000);
        assert_eq!(summary.expected_cash.cents(), 20000);
        assert_eq!(summary.cash_difference, Some(Money::from_cents(2000)));
        assert!(!summary.is_balanced());
    }

    #[test]
    fn test_orders_from_other_shifts_ignored() {
        let s = shift(ShiftStatus::Open, 0, None);
        let mut other = order("z", OrderStatus::Completed, 999, 999, 0);
        other.shift_id = Some("shift-2".to_string());

        let summary = ShiftSummary::compute(&s, &[other], &[payment("z", 999, PaymentMethod::Cash)]);
        assert_eq!(summary.total_orders, 0);
        assert!(summary.cash_sales.is_zero());
    }

    #[test]
    fn test_compute_is_idempotent() {
        let s = shift(ShiftStatus::Closed, 500, Some(1500));
        let orders = vec![order("a", OrderStatus::Completed, 1000, 1000, 0)];
        let payments = vec![payment("a", 1000, PaymentMethod::Cash)];

        let first = ShiftSummary::compute(&s, &orders, &payments);
        let second = ShiftSummary::compute(&s, &orders, &payments);
        assert_eq!(first, second);
        assert!(first.is_balanced());
    }
}
