//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    9.09 * 3 = 27.270000000000003                                        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    909 cents * 3 = 2727 cents                                           │
//! │                                                                         │
//! │  Order totals are sums and products of integers, so                    │
//! │  total == subtotal - discount + tax holds exactly.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use settle_core::money::Money;
//!
//! let unit = Money::from_cents(909);
//! let line = unit.multiply_quantity(3).unwrap();
//! assert_eq!(line.cents(), 2727);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: differences such as the cash over/short of a shift
///   can be negative
/// - **Transparent in SQL**: stored as a plain INTEGER column
///
/// ## Where Money Flows
/// ```text
/// Product.price_ex_gst ─┐
/// Product.gst_amount  ──┼──► OrderItem.sub_total / tax ──► Order totals
///                       │
/// Payment.amount ───────┴──► Order.paid_amount ──► Order.change_amount
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use settle_core::money::Money;
    ///
    /// let price = Money::from_cents(1000); // $10.00
    /// assert_eq!(price.cents(), 1000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit amount by a line quantity.
    ///
    /// Returns `None` on overflow so a hostile quantity cannot wrap a total.
    ///
    /// ## Example
    /// ```rust
    /// use settle_core::money::Money;
    ///
    /// let gst = Money::from_cents(91);
    /// assert_eq!(gst.multiply_quantity(3).unwrap().cents(), 273);
    /// assert!(Money::from_cents(i64::MAX).multiply_quantity(2).is_none());
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Returns `self - other`, floored at zero.
    ///
    /// Used for change due: overpayment produces change, underpayment
    /// produces none.
    ///
    /// ## Example
    /// ```rust
    /// use settle_core::money::Money;
    ///
    /// let paid = Money::from_cents(12000);
    /// let total = Money::from_cents(10000);
    /// assert_eq!(paid.saturating_sub_to_zero(total).cents(), 2000);
    /// assert_eq!(total.saturating_sub_to_zero(paid).cents(), 0);
    /// ```
    #[inline]
    pub fn saturating_sub_to_zero(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display is for logs and debugging; formatting for people lives with
/// the receipt layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
