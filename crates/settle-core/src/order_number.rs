//! Human-facing order numbers.
//!
//! Format: `ORD-YYYYMMDD-NNNNNN`, where the date is the order's creation
//! date (UTC) and `NNNNNN` is a counter allocated by storage inside the
//! creating transaction. The counter never resets, so uniqueness comes
//! from the counter alone and never from the clock.

use chrono::{DateTime, Utc};

/// Prefix of every order number.
pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Name of the storage counter that feeds order numbers.
pub const ORDER_SEQUENCE: &str = "order_number";

/// Formats an order number from a creation time and an allocated counter.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use settle_core::order_number::format_order_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 12, 9, 30, 0).unwrap();
/// assert_eq!(format_order_number(at, 42), "ORD-20260312-000042");
/// ```
pub fn format_order_number(created_at: DateTime<Utc>, seq: i64) -> String {
    format!(
        "{}-{}-{:06}",
        ORDER_NUMBER_PREFIX,
        created_at.format("%Y%m%d"),
        seq
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_pads_counter() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 59).unwrap();
        assert_eq!(format_order_number(at, 1), "ORD-20260105-000001");
        assert_eq!(format_order_number(at, 1_234_567), "ORD-20260105-1234567");
    }

    #[test]
    fn test_same_counter_different_days_differ_only_by_date() {
        let a = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 6, 12, 0, 0).unwrap();
        assert_ne!(format_order_number(a, 7), format_order_number(b, 7));
        assert!(format_order_number(b, 7).starts_with("ORD-20260106-"));
    }
}
