//! # Stock Ledger
//!
//! The only writer of stock levels. Every change appends an immutable
//! [`StockAdjustment`].
//!
//! ## Sale Depletion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► plan_sale_depletion() ──► DepletionPlan (one delta/target)   │
//! │              │                          │                               │
//! │              │ free reward lines        ├── shortfalls() (strict mode)  │
//! │              │ are skipped              │                               │
//! │              │ missing products are     └── apply_plan() ──► audit rows │
//! │              │ logged and skipped                                       │
//! │                                                                         │
//! │  Latte  (milk 150) × 2 ─┐                                               │
//! │  Cappuccino (milk 100) ─┴──► milk: -400   (one combined decrement)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, StockShortfall};
use crate::inventory::Inventory;
use crate::types::{
    AdjustmentKind, CartItem, InventoryConfig, Operator, RecipeItem, StockAdjustment, StockTarget,
};
use crate::validation::validate_stock_delta;

/// Reason text on reconciliation adjustments.
pub const PHYSICAL_COUNT_REASON: &str = "physical count";

/// Aggregated signed stock deltas, one per target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepletionPlan {
    deltas: BTreeMap<StockTarget, i64>,
    /// Product ids of lines that could not be resolved against the catalog.
    pub skipped: Vec<String>,
}

impl DepletionPlan {
    fn add(&mut self, target: StockTarget, delta: i64) {
        *self.deltas.entry(target).or_insert(0) += delta;
    }

    pub fn deltas(&self) -> impl Iterator<Item = (&StockTarget, i64)> {
        self.deltas.iter().map(|(t, d)| (t, *d))
    }

    pub fn delta_for(&self, target: &StockTarget) -> i64 {
        self.deltas.get(target).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// One line of a stock opname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockCount {
    pub target: StockTarget,
    pub counted: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    inventory: Inventory,
    adjustments: Vec<StockAdjustment>,
}

impl StockLedger {
    pub fn new(inventory: Inventory, adjustments: Vec<StockAdjustment>) -> Self {
        StockLedger {
            inventory,
            adjustments,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Catalog edits (not stock moves) go through here.
    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    /// Audit trail, oldest first.
    pub fn adjustments(&self) -> &[StockAdjustment] {
        &self.adjustments
    }

    // -------------------------------------------------------------------------
    // Planning
    // -------------------------------------------------------------------------

    /// Builds the combined decrement for a sale.
    ///
    /// ## Rules
    /// - Inventory disabled: empty plan
    /// - Reward lines priced exactly 0 consume nothing
    /// - Recipe products (ingredient tracking on) deplete their components;
    ///   product components only when that product tracks stock
    /// - Otherwise a stock-tracked product depletes itself
    /// - A line whose product vanished from the catalog is logged and skipped
    pub fn plan_sale_depletion(&self, lines: &[CartItem], config: &InventoryConfig) -> DepletionPlan {
        let mut plan = DepletionPlan::default();
        if !config.enabled {
            return plan;
        }

        for line in lines.iter().filter(|l| !l.is_free_reward()) {
            let Some(product_id) = line.product_id.as_deref() else {
                continue;
            };
            let Some(product) = self.inventory.product(product_id) else {
                warn!(product_id, line = %line.name, "product missing from catalog, skipping depletion");
                plan.skipped.push(product_id.to_string());
                continue;
            };

            if config.track_ingredients && product.has_recipe() {
                self.plan_components(&mut plan, &product.recipe, line.quantity, -1);
            } else if product.track_stock {
                plan.add(StockTarget::Product(product.id.clone()), -line.quantity);
            }
        }
        plan
    }

    /// Builds the inverse of what a sale actually depleted.
    ///
    /// Reads the `Sale` adjustments recorded against `transaction_id` and
    /// negates them, so catalog or inventory setting changes made after the
    /// sale never alter what a refund puts back.
    pub fn plan_restoration(&self, transaction_id: &str) -> DepletionPlan {
        let mut plan = DepletionPlan::default();
        for adjustment in self.adjustments.iter().filter(|a| {
            a.kind == AdjustmentKind::Sale && a.reference_id.as_deref() == Some(transaction_id)
        }) {
            plan.add(adjustment.target.clone(), -adjustment.delta);
        }
        plan
    }

    fn plan_components(&self, plan: &mut DepletionPlan, recipe: &[RecipeItem], quantity: i64, sign: i64) {
        for component in recipe {
            let target = component.target();
            if !self.inventory.tracks_stock(&target) {
                if !self.inventory.contains(&target) {
                    warn!(target = target.id(), "recipe component missing from inventory");
                }
                continue;
            }
            plan.add(target, sign * component.quantity() * quantity);
        }
    }

    /// Targets the plan would drive below zero.
    pub fn shortfalls(&self, plan: &DepletionPlan) -> Vec<StockShortfall> {
        plan.deltas()
            .filter_map(|(target, delta)| {
                let available = self.inventory.stock_of(target)?;
                (available + delta < 0).then(|| StockShortfall {
                    target_id: target.id().to_string(),
                    name: self.inventory.name_of(target).unwrap_or_default().to_string(),
                    available,
                    required: -delta,
                })
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Applying
    // -------------------------------------------------------------------------

    /// Applies every delta of a plan, one adjustment per target.
    pub(crate) fn apply_plan(
        &mut self,
        plan: &DepletionPlan,
        kind: AdjustmentKind,
        reason: &str,
        actor: &Operator,
        reference_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<StockAdjustment> {
        plan.deltas()
            .filter(|(_, delta)| *delta != 0)
            .filter_map(|(target, delta)| {
                self.record(target, delta, kind, reason, actor, reference_id, now)
            })
            .collect::<Vec<_>>()
    }

    /// Manual stock adjustment.
    ///
    /// ## Errors
    /// - `Validation` for a zero delta
    /// - `StockTargetNotFound` for an unknown product or raw material
    pub fn adjust(
        &mut self,
        target: &StockTarget,
        delta: i64,
        reason: &str,
        actor: &Operator,
        now: DateTime<Utc>,
    ) -> CoreResult<StockAdjustment> {
        validate_stock_delta(delta)?;
        if !self.inventory.contains(target) {
            return Err(CoreError::StockTargetNotFound(target.id().to_string()));
        }
        self.record(target, delta, AdjustmentKind::Manual, reason, actor, None, now)
            .ok_or_else(|| CoreError::StockTargetNotFound(target.id().to_string()))
    }

    /// Stock opname: one adjustment per target whose count differs.
    ///
    /// All targets are checked before any stock moves.
    pub fn reconcile(
        &mut self,
        counts: &[StockCount],
        actor: &Operator,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<StockAdjustment>> {
        let mut deltas = Vec::with_capacity(counts.len());
        for count in counts {
            let system = self
                .inventory
                .stock_of(&count.target)
                .ok_or_else(|| CoreError::StockTargetNotFound(count.target.id().to_string()))?;
            if count.counted != system {
                deltas.push((count.target.clone(), count.counted - system));
            }
        }

        Ok(deltas
            .into_iter()
            .filter_map(|(target, delta)| {
                self.record(
                    &target,
                    delta,
                    AdjustmentKind::PhysicalCount,
                    PHYSICAL_COUNT_REASON,
                    actor,
                    None,
                    now,
                )
            })
            .collect())
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        target: &StockTarget,
        delta: i64,
        kind: AdjustmentKind,
        reason: &str,
        actor: &Operator,
        reference_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<StockAdjustment> {
        let resulting_stock = self.inventory.stock_of(target)? + delta;
        self.inventory.set_stock(target, resulting_stock);

        let adjustment = StockAdjustment {
            id: Uuid::new_v4().to_string(),
            target: target.clone(),
            target_name: self.inventory.name_of(target).unwrap_or_default().to_string(),
            delta,
            resulting_stock,
            kind,
            reason: reason.to_string(),
            actor: actor.clone(),
            reference_id: reference_id.map(str::to_string),
            went_negative: resulting_stock < 0,
            created_at: now,
        };
        self.adjustments.push(adjustment.clone());
        Some(adjustment)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
