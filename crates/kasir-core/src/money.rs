//! # Money Module
//!
//! Provides the `Money` and `Rate` types every price, discount, tax and
//! payment flows through.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  A till that sums floats drifts. A till that sums integers does not.    │
//! │                                                                         │
//! │  OUR SOLUTION: the smallest currency unit as i64                        │
//! │    Every rounding step is explicit (see `percent` and `scale`)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kasir_core::money::{Money, Rate};
//!
//! let price = Money::from_minor(25_000);
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.minor(), 50_000);
//!
//! let tax = line.percent(Rate::from_percent(11));
//! assert_eq!(tax.minor(), 5_500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in one whole (100 %).
pub const BPS_SCALE: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: reward lines carry negative prices, refunds reverse
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No currency code**: one terminal, one currency (formatting is the UI's job)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in the smallest currency unit.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Es Teh 8,000
    /// Quantity: 3
    ///      │
    ///      ▼
    /// multiply_quantity(3) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line gross: 24,000
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `rate` of this amount, rounded half away from zero.
    ///
    /// ## Implementation
    /// Integer math on i128: `amount * bps / 10000` with explicit rounding.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::money::{Money, Rate};
    ///
    /// let base = Money::from_minor(1_005);
    /// // 1,005 × 10% = 100.5 → 101
    /// assert_eq!(base.percent(Rate::from_percent(10)).minor(), 101);
    /// ```
    pub fn percent(&self, rate: Rate) -> Money {
        Money(div_round(
            self.0 as i128 * rate.bps() as i128,
            BPS_SCALE as i128,
        ) as i64)
    }

    /// Scales this amount by `numerator / denominator`, rounded half away
    /// from zero. A non-positive denominator yields zero.
    pub fn scale(&self, numerator: Money, denominator: Money) -> Money {
        if denominator.0 <= 0 {
            return Money::zero();
        }
        Money(div_round(
            self.0 as i128 * numerator.0 as i128,
            denominator.0 as i128,
        ) as i64)
    }

    /// Clamps into `[lower, upper]`. When `upper < lower` the result is `lower`.
    pub fn clamp_between(self, lower: Money, upper: Money) -> Money {
        if upper < lower {
            return lower;
        }
        self.max(lower).min(upper)
    }

    /// Returns zero for negative amounts.
    #[inline]
    pub fn non_negative(self) -> Money {
        self.max(Money::zero())
    }
}

/// Integer division rounding half away from zero. `d` must be positive.
fn div_round(n: i128, d: i128) -> i128 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Bare amount in the smallest unit. Currency formatting belongs to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
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
// Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000. 1100 bps = 11% (PPN),
/// 500 bps = 5% service charge, 2500 bps = a 25% discount.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Whole-percent convenience: `from_percent(10)` is 10%.
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        Rate(pct * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// True when the rate lies in 0%..=100%.
    #[inline]
    pub const fn is_valid_percentage(&self) -> bool {
        self.0 <= BPS_SCALE
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
