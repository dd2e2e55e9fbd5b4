//! # Held Cart Registry
//!
//! Suspended order tabs. An arena of held carts keyed by id plus a single
//! "active id or none" pointer.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌────────────┐  hold(name)   ┌──────────────┐  switch(other)          │
//! │   │  new cart  │──────────────►│ HeldCart(id) │─────────┐               │
//! │   │ (id: none) │◄──────────────│   active     │         │               │
//! │   └────────────┘  switch(none) └──────┬───────┘         ▼               │
//! │         ▲         delete(active)      │ commit    flush THEN load       │
//! │         └─────────────────────────────┘ (retire)                        │
//! │                                                                         │
//! │   Every transition out of a held cart flushes unsaved edits first.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshots store purchased lines and metadata. Rewards and cart discounts
//! belong to the session and are dropped on every switch.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};
use crate::types::{HeldCart, OrderMetadata};
use crate::validation::validate_name;

#[derive(Debug, Clone, Default)]
pub struct HeldCartRegistry {
    carts: BTreeMap<String, HeldCart>,
    active: Option<String>,
    retired: BTreeSet<String>,
}

impl HeldCartRegistry {
    pub fn new() -> Self {
        HeldCartRegistry::default()
    }

    /// Restores held carts loaded from storage. Nothing is active.
    pub fn from_held(carts: impl IntoIterator<Item = HeldCart>) -> Self {
        HeldCartRegistry {
            carts: carts.into_iter().map(|c| (c.id.clone(), c)).collect(),
            active: None,
            retired: BTreeSet::new(),
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&HeldCart> {
        self.carts.get(id)
    }

    /// Held carts ordered by creation time.
    pub fn list(&self) -> Vec<&HeldCart> {
        let mut carts: Vec<&HeldCart> = self.carts.values().collect();
        carts.sort_by_key(|c| c.created_at);
        carts
    }

    pub fn len(&self) -> usize {
        self.carts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    /// True when the active held cart's snapshot lags the working cart.
    pub fn is_dirty(&self, cart: &Cart) -> bool {
        match self.active.as_ref().and_then(|id| self.carts.get(id)) {
            Some(held) => !snapshot_matches(held, cart),
            None => false,
        }
    }

    /// Writes the working cart into the active held cart if it changed.
    /// Returns the updated snapshot for persistence.
    pub fn flush(&mut self, cart: &Cart, now: DateTime<Utc>) -> Option<HeldCart> {
        let id = self.active.as_ref()?;
        let held = self.carts.get_mut(id)?;
        if snapshot_matches(held, cart) {
            return None;
        }
        held.items = cart.purchased_items();
        held.metadata = cart.metadata().clone();
        held.updated_at = now;
        Some(held.clone())
    }

    /// Suspends the working cart under `name` and makes it active.
    ///
    /// Returns every snapshot written: the outgoing held cart (if it had
    /// unsaved edits) followed by the new one.
    pub fn hold(&mut self, cart: &mut Cart, name: &str, now: DateTime<Utc>) -> CoreResult<Vec<HeldCart>> {
        let items = cart.purchased_items();
        if items.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        let name = validate_name("held cart name", name)?;

        let mut saved = Vec::with_capacity(2);
        saved.extend(self.flush(cart, now));

        let held = HeldCart {
            id: Uuid::new_v4().to_string(),
            name,
            items,
            metadata: cart.metadata().clone(),
            created_at: now,
            updated_at: now,
        };
        self.carts.insert(held.id.clone(), held.clone());
        self.active = Some(held.id.clone());
        cart.load(held.items.clone(), held.metadata.clone());
        saved.push(held);
        Ok(saved)
    }

    /// Makes `target` (or the new cart, for `None`) the working cart.
    ///
    /// The outgoing held cart is flushed before the target is loaded; the
    /// flushed snapshot is returned for persistence.
    pub fn switch(
        &mut self,
        cart: &mut Cart,
        target: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<HeldCart>> {
        let incoming = match target {
            Some(id) => {
                self.ensure_live(id)?;
                self.carts
                    .get(id)
                    .map(|h| (h.items.clone(), h.metadata.clone()))
            }
            None => None,
        };

        let flushed = self.flush(cart, now);

        match incoming {
            Some((items, metadata)) => {
                cart.load(items, metadata);
                self.active = target.map(str::to_string);
            }
            None => {
                cart.load(Vec::new(), OrderMetadata::default());
                self.active = None;
            }
        }
        Ok(flushed)
    }

    pub fn rename(&mut self, id: &str, name: &str, now: DateTime<Utc>) -> CoreResult<HeldCart> {
        self.ensure_live(id)?;
        let name = validate_name("held cart name", name)?;
        let held = self
            .carts
            .get_mut(id)
            .ok_or_else(|| CoreError::HeldCartNotFound(id.to_string()))?;
        held.name = name;
        held.updated_at = now;
        Ok(held.clone())
    }

    /// Deletes a held cart. Deleting the active one switches to the new cart
    /// first.
    pub fn delete(&mut self, cart: &mut Cart, id: &str, now: DateTime<Utc>) -> CoreResult<HeldCart> {
        self.ensure_live(id)?;
        if self.active.as_deref() == Some(id) {
            self.switch(cart, None, now)?;
        }
        self.carts
            .remove(id)
            .ok_or_else(|| CoreError::HeldCartNotFound(id.to_string()))
    }

    /// Retires the active held cart after its commit. Returns the retired id.
    pub(crate) fn retire_active(&mut self) -> Option<String> {
        let id = self.active.take()?;
        self.carts.remove(&id);
        self.retired.insert(id.clone());
        Some(id)
    }

    fn ensure_live(&self, id: &str) -> CoreResult<()> {
        if self.retired.contains(id) {
            return Err(CoreError::HeldCartRetired(id.to_string()));
        }
        if !self.carts.contains_key(id) {
            return Err(CoreError::HeldCartNotFound(id.to_string()));
        }
        Ok(())
    }
}

fn snapshot_matches(held: &HeldCart, cart: &Cart) -> bool {
    let purchased = cart.items().iter().filter(|i| !i.is_reward);
    held.metadata == *cart.metadata() && held.items.iter().eq(purchased)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::product;
    use crate::inventory::Inventory;
    use crate::money::Rate;
    use crate::types::{Discount, InventoryConfig};

    fn add(cart: &mut Cart, id: &str) -> String {
        cart.add_product(
            &product(id, id, 10_000),
            None,
            &InventoryConfig::default(),
            &Inventory::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_hold_empty_cart_fails() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        assert!(matches!(
            registry.hold(&mut cart, "Meja 1", Utc::now()),
            Err(CoreError::EmptyCart)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_hold_activates_snapshot() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        add(&mut cart, "teh");
        cart.apply_cart_discount(Discount::percentage(Rate::from_percent(10)))
            .unwrap();

        let saved = registry.hold(&mut cart, "Meja 1", Utc::now()).unwrap();
        assert_eq!(saved.len(), 1);
        let id = saved[0].id.clone();

        assert_eq!(registry.active_id(), Some(id.as_str()));
        assert_eq!(cart.items().len(), 1);
        // Cart discount is session state and does not survive the switch.
        assert!(cart.discount().is_none());
    }

    #[test]
    fn test_switch_flushes_before_load() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        add(&mut cart, "teh");
        let h = registry.hold(&mut cart, "H", Utc::now()).unwrap()[0].id.clone();

        // Edit H without saving.
        let line = cart.items()[0].line_id.clone();
        cart.set_quantity(&line, 4).unwrap();
        add(&mut cart, "kopi");
        assert!(registry.is_dirty(&cart));

        let flushed = registry.switch(&mut cart, None, Utc::now()).unwrap();

        let stored = registry.get(&h).unwrap();
        assert_eq!(flushed.as_ref(), Some(stored));
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].quantity, 4);
        assert!(cart.is_empty());
        assert_eq!(registry.active_id(), None);

        // And back again.
        registry.switch(&mut cart, Some(h.as_str()), Utc::now()).unwrap();
        assert_eq!(cart.items().len(), 2);
    }

    #[test]
    fn test_switch_without_edits_writes_nothing() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        add(&mut cart, "teh");
        registry.hold(&mut cart, "H", Utc::now()).unwrap();

        assert!(registry.switch(&mut cart, None, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_hold_from_held_flushes_outgoing() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        add(&mut cart, "teh");
        registry.hold(&mut cart, "A", Utc::now()).unwrap();
        add(&mut cart, "kopi");

        let saved = registry.hold(&mut cart, "B", Utc::now()).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].name, "A");
        assert_eq!(saved[0].items.len(), 2);
        assert_eq!(saved[1].name, "B");
    }

    #[test]
    fn test_rename_and_delete_active() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        add(&mut cart, "teh");
        let id = registry.hold(&mut cart, "Meja 1", Utc::now()).unwrap()[0].id.clone();

        let renamed = registry.rename(&id, "Meja 2", Utc::now()).unwrap();
        assert_eq!(renamed.name, "Meja 2");

        registry.delete(&mut cart, &id, Utc::now()).unwrap();
        assert_eq!(registry.active_id(), None);
        assert!(cart.is_empty());
        assert!(matches!(
            registry.switch(&mut cart, Some(id.as_str()), Utc::now()),
            Err(CoreError::HeldCartNotFound(_))
        ));
    }

    #[test]
    fn test_retired_cart_cannot_be_reentered() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        add(&mut cart, "teh");
        let id = registry.hold(&mut cart, "Meja 1", Utc::now()).unwrap()[0].id.clone();

        assert_eq!(registry.retire_active(), Some(id.clone()));
        assert!(matches!(
            registry.switch(&mut cart, Some(id.as_str()), Utc::now()),
            Err(CoreError::HeldCartRetired(_))
        ));
        assert!(matches!(
            registry.delete(&mut cart, &id, Utc::now()),
            Err(CoreError::HeldCartRetired(_))
        ));
    }

    #[test]
    fn test_metadata_change_marks_dirty() {
        let mut registry = HeldCartRegistry::new();
        let mut cart = Cart::new();
        add(&mut cart, "teh");
        registry.hold(&mut cart, "H", Utc::now()).unwrap();

        cart.set_metadata(OrderMetadata {
            order_type: "take-away".to_string(),
            table: None,
            guest_count: None,
        })
        .unwrap();
        assert!(registry.is_dirty(&cart));
    }
}
