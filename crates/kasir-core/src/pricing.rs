//! # Pricing Engine
//!
//! Computes cart totals from lines, an optional cart discount and the tax
//! configuration. [`compute_totals`] is pure and infallible; negative
//! discount values are rejected by [`crate::validation::validate_discount`]
//! before they get here.
//!
//! ## Computation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per line:  gross = (unit + extras) × qty                               │
//! │             line discount = clamp(amount | gross × pct, 0, gross)        │
//! │             raw tax += (gross - line discount) × line rate               │
//! │             (reward lines: gross only, no discount, no tax)             │
//! │                                                                         │
//! │  subtotal             = Σ gross            (reward lines included)      │
//! │  after item discounts = subtotal - Σ line discount                      │
//! │  cart discount        = clamp(amount | after × pct, 0, after)           │
//! │  tax                  = raw tax × (after - cart discount) / after       │
//! │  taxable              = after - cart discount                           │
//! │  service              = taxable × service rate                          │
//! │  final                = max(taxable + service + tax, 0)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Drift
//! Tax is computed per line before the cart discount is known, then scaled
//! down proportionally. Mixed-rate carts can be off by one unit against an
//! exact per-line recomputation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartItem, Discount, DiscountDefinition, DiscountKind, TaxConfig};

// =============================================================================
// Totals
// =============================================================================

/// Result of a pricing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal: Money,
    pub item_discount_total: Money,
    pub cart_discount_total: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub final_total: Money,
}

impl Totals {
    /// Subtotal after line discounts, before the cart discount.
    pub fn after_item_discounts(&self) -> Money {
        self.subtotal - self.item_discount_total
    }
}

// =============================================================================
// Discount Evaluation
// =============================================================================

impl Discount {
    /// Discount amount against `base`, clamped to `[0, base]`.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::money::{Money, Rate};
    /// use kasir_core::types::Discount;
    ///
    /// let d = Discount::percentage(Rate::from_percent(70));
    /// assert_eq!(d.amount_on(Money::from_minor(50_000)).minor(), 35_000);
    ///
    /// let d = Discount::amount(Money::from_minor(100_000));
    /// assert_eq!(d.amount_on(Money::from_minor(40_000)).minor(), 40_000);
    /// ```
    pub fn amount_on(&self, base: Money) -> Money {
        let raw = match self.kind {
            DiscountKind::Amount(value) => value,
            DiscountKind::Percentage(rate) => base.percent(rate),
        };
        raw.clamp_between(Money::zero(), base.non_negative())
    }

    /// Instantiates a discount template, linked back by id.
    ///
    /// Fails when the definition is inactive or `now` is outside its window.
    pub fn from_definition(def: &DiscountDefinition, now: DateTime<Utc>) -> CoreResult<Discount> {
        if !def.is_valid_at(now) {
            return Err(CoreError::DiscountNotActive(def.name.clone()));
        }
        Ok(Discount {
            kind: def.kind,
            name: Some(def.name.clone()),
            definition_id: Some(def.id.clone()),
        })
    }
}

/// Discount applied to one line. Reward lines are never discounted.
pub fn line_discount(item: &CartItem) -> Money {
    if item.is_reward {
        return Money::zero();
    }
    item.discount
        .as_ref()
        .map_or(Money::zero(), |d| d.amount_on(item.gross()))
}

// =============================================================================
// Engine
// =============================================================================

/// Computes totals for a cart.
///
/// ## Reward Lines
/// A reward line adds its own (zero or negative) price to the subtotal and
/// nothing else: it is never discounted and never taxed.
pub fn compute_totals(items: &[CartItem], cart_discount: Option<&Discount>, config: &TaxConfig) -> Totals {
    let mut subtotal = Money::zero();
    let mut item_discount_total = Money::zero();
    let mut raw_tax = Money::zero();

    for item in items {
        let gross = item.gross();
        subtotal += gross;
        if item.is_reward {
            continue;
        }

        let discount = line_discount(item);
        let rate = item.tax_rate.unwrap_or(config.tax_rate);
        item_discount_total += discount;
        raw_tax += (gross - discount).percent(rate);
    }

    let after_item_discounts = subtotal - item_discount_total;
    let cart_discount_total =
        cart_discount.map_or(Money::zero(), |d| d.amount_on(after_item_discounts));

    let taxable = after_item_discounts - cart_discount_total;
    let tax = if after_item_discounts.is_positive() {
        raw_tax.scale(taxable, after_item_discounts)
    } else {
        Money::zero()
    };

    let service_charge = taxable.non_negative().percent(config.service_charge_rate);
    let final_total = (taxable + service_charge + tax).non_negative();

    Totals {
        subtotal,
        item_discount_total,
        cart_discount_total,
        tax,
        service_charge,
        final_total,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
