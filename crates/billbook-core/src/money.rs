//! # Money
//!
//! Exact decimal amounts for rates, line totals, discounts and tax.
//!
//! ```text
//!   rate (per primary unit)  ×  quantity   =  line amount     (exact)
//!   Σ line amounts − discount              =  bill amount     (rounded once)
//!   Σ lot draws × lot unit_cost            =  cost of goods   (exact)
//! ```
//!
//! Per-gram rates such as ₹13.3335 and half-percent GST splits make integer
//! paise lossy, so amounts are `rust_decimal::Decimal` and rounding happens
//! only where a rule asks for it: the bill amount goes to the nearest whole
//! unit, half away from zero.
//!
//! ## Usage
//! ```rust
//! use billbook_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let total = Money::new(Decimal::new(133_335, 3)); // 133.335
//! assert_eq!(total.round_to_unit(), Money::from(133));
//! ```

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::quantity::Quantity;
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the organisation's currency.
///
/// Signed, so reversals and discount deltas fit. Serialized as a string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Wraps a decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// ₹0.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// True for reversals and over-discounted totals.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Rounds to the nearest whole currency unit.
    ///
    /// ## Rounding Rule
    /// Half away from zero: `132.5 → 133`, `-2.5 → -3`, `133.335 → 133`.
    /// This is the rule used for every bill amount (sales and purchases).
    pub fn round_to_unit(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Rounds to `dp` decimal places, half away from zero.
    pub fn round_dp(&self, dp: u32) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Multiplies a per-unit price by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use billbook_core::{Money, Quantity};
    ///
    /// let rate = Money::from(40);
    /// assert_eq!(rate.times(Quantity::from(3)), Money::from(120));
    /// ```
    #[inline]
    pub fn times(&self, quantity: Quantity) -> Money {
        Money(self.0 * quantity.value())
    }

    /// Tax on this amount at the given rate, unrounded.
    ///
    /// GST figures stay exact; the bill amount is the only rounded value.
    pub fn tax_at(&self, rate: TaxRate) -> Money {
        Money(self.0 * rate.fraction())
    }

    /// Discount expressed as a percentage of `self`, rounded to 2 places.
    ///
    /// Returns zero when `self` is zero (an empty bill has no percentage).
    pub fn percentage_of(&self, part: Money) -> Decimal {
        if self.0.is_zero() {
            return Decimal::ZERO;
        }
        (part.0 / self.0 * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Money(Decimal::from(amount))
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Decimal) -> Self {
        Money(self.0 * factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Money)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
