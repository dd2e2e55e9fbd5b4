//! # Terminal State
//!
//! Everything one terminal holds in memory: the working cart, held carts,
//! the stock ledger, customers, loyalty configuration and the transaction
//! log. In-memory state is the source of truth; every durable mutation is
//! described by a [`StateChange`] handed to the persistence layer.
//!
//! ## Two Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI ──► TerminalState method ──► mutate memory ──► Vec<StateChange>     │
//! │                                                        │                │
//! │                                                        ▼                │
//! │                                    persist boundary (kasir-db writer)   │
//! │                                                                         │
//! │  A method that returns Err has changed nothing and emits nothing.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, LineSelection};
use crate::error::{CoreError, CoreResult};
use crate::held::HeldCartRegistry;
use crate::inventory::Inventory;
use crate::ledger::{StockCount, StockLedger};
use crate::loyalty::redeem;
use crate::receipt::ReceiptCounter;
use crate::types::{
    Customer, Discount, DiscountDefinition, HeldCart, InventoryConfig, Operator, PointRule,
    Reward, StockAdjustment, StockTarget, Transaction,
};

// =============================================================================
// State Change
// =============================================================================

/// A durable mutation, written by the persistence layer as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StateChange {
    /// Transaction, stock, customer balance and held-cart retirement together.
    Committed(CommitReceipt),
    /// Installment appended to an existing transaction.
    PaymentAdded(Transaction),
    Refunded(RefundReceipt),
    StockAdjusted(Vec<StockAdjustment>),
    HeldCartSaved(HeldCart),
    HeldCartDeleted(String),
}

impl StateChange {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StateChange::Committed(_) => "committed",
            StateChange::PaymentAdded(_) => "payment_added",
            StateChange::Refunded(_) => "refunded",
            StateChange::StockAdjusted(_) => "stock_adjusted",
            StateChange::HeldCartSaved(_) => "held_cart_saved",
            StateChange::HeldCartDeleted(_) => "held_cart_deleted",
        }
    }
}

/// Everything a successful commit changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub transaction: Transaction,
    pub adjustments: Vec<StockAdjustment>,
    /// Customer with the updated point balance.
    pub customer: Option<Customer>,
    pub retired_held_cart: Option<String>,
}

/// Everything a refund changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub transaction: Transaction,
    pub adjustments: Vec<StockAdjustment>,
    pub customer: Option<Customer>,
}

// =============================================================================
// Transaction Log
// =============================================================================

/// Append-only list of transactions with lookup by id.
#[derive(Debug, Clone, Default)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
    index: BTreeMap<String, usize>,
}

impl TransactionLog {
    pub fn new(entries: Vec<Transaction>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        TransactionLog { entries, index }
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        let i = *self.index.get(id)?;
        self.entries.get_mut(i)
    }

    pub(crate) fn append(&mut self, transaction: Transaction) {
        self.index
            .insert(transaction.id.clone(), self.entries.len());
        self.entries.push(transaction);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Terminal State
// =============================================================================

/// Collections loaded from storage at start-up.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub inventory: Inventory,
    pub adjustments: Vec<StockAdjustment>,
    pub customers: Vec<Customer>,
    pub point_rules: Vec<PointRule>,
    pub rewards: Vec<Reward>,
    pub discount_definitions: Vec<DiscountDefinition>,
    pub held_carts: Vec<HeldCart>,
    pub transactions: Vec<Transaction>,
    pub receipts: ReceiptCounter,
}

#[derive(Debug, Clone, Default)]
pub struct TerminalState {
    pub cart: Cart,
    pub held: HeldCartRegistry,
    pub ledger: StockLedger,
    pub customers: BTreeMap<String, Customer>,
    pub point_rules: Vec<PointRule>,
    pub rewards: Vec<Reward>,
    pub discount_definitions: Vec<DiscountDefinition>,
    pub transactions: TransactionLog,
    pub receipts: ReceiptCounter,
}

impl TerminalState {
    pub fn new() -> Self {
        TerminalState::default()
    }

    pub fn restore(snapshot: StateSnapshot) -> Self {
        TerminalState {
            cart: Cart::new(),
            held: HeldCartRegistry::from_held(snapshot.held_carts),
            ledger: StockLedger::new(snapshot.inventory, snapshot.adjustments),
            customers: snapshot
                .customers
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            point_rules: snapshot.point_rules,
            rewards: snapshot.rewards,
            discount_definitions: snapshot.discount_definitions,
            transactions: TransactionLog::new(snapshot.transactions),
            receipts: snapshot.receipts,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        self.ledger.inventory()
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    /// Adds a catalog product to the working cart.
    pub fn add_product(
        &mut self,
        product_id: &str,
        selection: Option<&LineSelection>,
        config: &InventoryConfig,
    ) -> CoreResult<String> {
        let inventory = self.ledger.inventory();
        let product = inventory
            .product(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        self.cart.add_product(product, selection, config, inventory)
    }

    /// Applies a configured discount to one line, or to the whole cart when
    /// `line_id` is `None`.
    pub fn apply_discount_definition(
        &mut self,
        definition_id: &str,
        line_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let def = self
            .discount_definitions
            .iter()
            .find(|d| d.id == definition_id)
            .ok_or_else(|| CoreError::DiscountNotActive(definition_id.to_string()))?;
        let discount = Discount::from_definition(def, now)?;
        match line_id {
            Some(line_id) => self.cart.apply_line_discount(line_id, discount),
            None => self.cart.apply_cart_discount(discount),
        }
    }

    /// Redeems a reward for a customer into the working cart.
    pub fn apply_reward(&mut self, reward_id: &str, customer_id: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let reward = self
            .rewards
            .iter()
            .find(|r| r.id == reward_id)
            .cloned()
            .ok_or_else(|| CoreError::RewardNotFound(reward_id.to_string()))?;
        let customer = self
            .customers
            .get(customer_id)
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;
        let line = redeem(&reward, customer, self.ledger.inventory(), now)?;
        self.cart.apply_reward(reward, customer_id, line)
    }

    // -------------------------------------------------------------------------
    // Held carts
    // -------------------------------------------------------------------------

    pub fn hold_cart(&mut self, name: &str, now: DateTime<Utc>) -> CoreResult<Vec<StateChange>> {
        let saved = self.held.hold(&mut self.cart, name, now)?;
        Ok(saved.into_iter().map(StateChange::HeldCartSaved).collect())
    }

    pub fn switch_cart(&mut self, target: Option<&str>, now: DateTime<Utc>) -> CoreResult<Vec<StateChange>> {
        let flushed = self.held.switch(&mut self.cart, target, now)?;
        Ok(flushed.into_iter().map(StateChange::HeldCartSaved).collect())
    }

    /// Saves the active held cart without switching away.
    pub fn save_active_cart(&mut self, now: DateTime<Utc>) -> Vec<StateChange> {
        self.held
            .flush(&self.cart, now)
            .into_iter()
            .map(StateChange::HeldCartSaved)
            .collect()
    }

    pub fn rename_held_cart(&mut self, id: &str, name: &str, now: DateTime<Utc>) -> CoreResult<StateChange> {
        let held = self.held.rename(id, name, now)?;
        Ok(StateChange::HeldCartSaved(held))
    }

    pub fn delete_held_cart(&mut self, id: &str, now: DateTime<Utc>) -> CoreResult<StateChange> {
        let removed = self.held.delete(&mut self.cart, id, now)?;
        Ok(StateChange::HeldCartDeleted(removed.id))
    }

    // -------------------------------------------------------------------------
    // Stock
    // -------------------------------------------------------------------------

    pub fn adjust_stock(
        &mut self,
        target: &StockTarget,
        delta: i64,
        reason: &str,
        actor: &Operator,
        now: DateTime<Utc>,
    ) -> CoreResult<StateChange> {
        let adjustment = self.ledger.adjust(target, delta, reason, actor, now)?;
        Ok(StateChange::StockAdjusted(vec![adjustment]))
    }

    /// Stock opname. Returns `None` when every count matched.
    pub fn reconcile_stock(
        &mut self,
        counts: &[StockCount],
        actor: &Operator,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<StateChange>> {
        let adjustments = self.ledger.reconcile(counts, actor, now)?;
        Ok((!adjustments.is_empty()).then_some(StateChange::StockAdjusted(adjustments)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{customer, operator, product, stocked};
    use crate::money::{Money, Rate};
    use crate::types::{DiscountKind, RewardKind};

    fn state() -> TerminalState {
        TerminalState::restore(StateSnapshot {
            inventory: Inventory::new(
                vec![product("teh", "Es Teh", 8_000), stocked("air", "Air", 5_000, 3)],
                vec![],
            ),
            customers: vec![customer("c1", 100)],
            rewards: vec![Reward {
                id: "rw".to_string(),
                name: "Potongan".to_string(),
                points_cost: 50,
                kind: RewardKind::DiscountAmount {
                    value: Money::from_minor(2_000),
                },
            }],
            discount_definitions: vec![DiscountDefinition {
                id: "def".to_string(),
                name: "Promo".to_string(),
                kind: DiscountKind::Percentage(Rate::from_percent(10)),
                valid_from: None,
                valid_until: None,
                is_active: true,
            }],
            ..StateSnapshot::default()
        })
    }

    #[test]
    fn test_add_unknown_product() {
        let mut s = state();
        assert!(matches!(
            s.add_product("ghost", None, &InventoryConfig::default()),
            Err(CoreError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_hold_and_delete_emit_changes() {
        let mut s = state();
        s.add_product("teh", None, &InventoryConfig::default()).unwrap();

        let changes = s.hold_cart("Meja 3", Utc::now()).unwrap();
        assert_eq!(changes.len(), 1);
        let id = match &changes[0] {
            StateChange::HeldCartSaved(h) => h.id.clone(),
            other => panic!("unexpected change {other:?}"),
        };

        let change = s.delete_held_cart(&id, Utc::now()).unwrap();
        assert_eq!(change, StateChange::HeldCartDeleted(id));
    }

    #[test]
    fn test_apply_reward_and_definition() {
        let mut s = state();
        let line = s.add_product("teh", None, &InventoryConfig::default()).unwrap();
        s.apply_reward("rw", "c1", Utc::now()).unwrap();
        s.apply_discount_definition("def", Some(line.as_str()), Utc::now()).unwrap();

        assert_eq!(s.cart.items().len(), 2);
        assert!(s.cart.line(&line).unwrap().discount.is_some());
        assert!(matches!(
            s.apply_reward("rw", "nobody", Utc::now()),
            Err(CoreError::CustomerNotFound(_))
        ));
    }

    #[test]
    fn test_reconcile_without_differences() {
        let mut s = state();
        let counts = vec![StockCount {
            target: StockTarget::Product("air".to_string()),
            counted: 3,
        }];
        assert!(s.reconcile_stock(&counts, &operator(), Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_state_change_serde_tag() {
        let json = serde_json::to_string(&StateChange::HeldCartDeleted("h1".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"held_cart_deleted","data":"h1"}"#);
    }
}
