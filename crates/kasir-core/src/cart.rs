//! # Cart State
//!
//! The single working order of a terminal: ordered lines, at most one cart
//! discount, at most one applied reward, and order metadata.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Tap product ────────► add_product() ──────► merge or push line         │
//! │                           └── availability + selection checked first    │
//! │  Change quantity ────► set_quantity() ─────► qty ≤ 0 removes the line   │
//! │  Remove ─────────────► remove_line()                                    │
//! │  Discount ───────────► apply_line_discount() / apply_cart_discount()    │
//! │  Redeem ─────────────► apply_reward() ─────► replaces any reward line   │
//! │  New order ──────────► clear() ────────────► lines, discount, reward,   │
//! │                                               metadata all reset        │
//! │                                                                         │
//! │  Every operation either fully applies or returns an error untouched.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::availability::check_availability;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::inventory::Inventory;
use crate::pricing::{compute_totals, Totals};
use crate::types::{
    Addon, AppliedReward, CartItem, Discount, InventoryConfig, OrderMetadata, Product, Reward,
    SelectedModifier, TaxConfig, Variant,
};
use crate::validation::{
    validate_cart_size, validate_discount, validate_modifier_selection, validate_name,
    validate_quantity,
};
use crate::MAX_ITEM_QUANTITY;

/// Options picked in the product's selection dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineSelection {
    #[serde(default)]
    pub addon_ids: Vec<String>,
    #[serde(default)]
    pub variant_id: Option<String>,
    /// `(group_id, option_id)` pairs.
    #[serde(default)]
    pub modifiers: Vec<(String, String)>,
    pub quantity: i64,
}

impl Default for LineSelection {
    fn default() -> Self {
        LineSelection {
            addon_ids: Vec::new(),
            variant_id: None,
            modifiers: Vec::new(),
            quantity: 1,
        }
    }
}

/// The working order.
///
/// ## Invariants
/// - Non-reward lines without options are unique by product (re-adding
///   increments quantity)
/// - At most one reward line, and it matches `applied_reward`
/// - Maximum lines: 100, maximum quantity per line: 999
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    items: Vec<CartItem>,
    discount: Option<Discount>,
    applied_reward: Option<AppliedReward>,
    metadata: OrderMetadata,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }

    pub fn applied_reward(&self) -> Option<&AppliedReward> {
        self.applied_reward.as_ref()
    }

    pub fn metadata(&self) -> &OrderMetadata {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self, line_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.line_id == line_id)
    }

    /// Lines excluding the reward line (what a held cart stores).
    pub fn purchased_items(&self) -> Vec<CartItem> {
        self.items.iter().filter(|i| !i.is_reward).cloned().collect()
    }

    /// Recomputes totals for display or checkout.
    pub fn totals(&self, config: &TaxConfig) -> Totals {
        compute_totals(&self.items, self.discount.as_ref(), config)
    }

    // -------------------------------------------------------------------------
    // Lines
    // -------------------------------------------------------------------------

    /// Adds a product, returning the id of the line it landed on.
    ///
    /// ## Behavior
    /// - Unavailable product: `ProductUnavailable`, cart untouched
    /// - Product with add-ons, variants or modifier groups: always a new line
    /// - Otherwise: increments the existing plain line of that product
    pub fn add_product(
        &mut self,
        product: &Product,
        selection: Option<&LineSelection>,
        inventory_config: &InventoryConfig,
        inventory: &Inventory,
    ) -> CoreResult<String> {
        let availability = check_availability(product, inventory_config, inventory);
        if let Some(reason) = availability.reason {
            return Err(CoreError::ProductUnavailable {
                product: product.name.clone(),
                reason: reason.to_string(),
            });
        }

        let quantity = selection.map_or(1, |s| s.quantity);
        validate_quantity(quantity)?;

        if product.requires_selection() || selection.is_some_and(has_options) {
            let default_selection = LineSelection {
                quantity,
                ..LineSelection::default()
            };
            let line = build_line(product, selection.unwrap_or(&default_selection))?;
            validate_cart_size(self.items.len())?;
            let line_id = line.line_id.clone();
            self.items.push(line);
            return Ok(line_id);
        }

        if let Some(existing) = self.items.iter_mut().find(|i| {
            !i.is_reward && !i.is_configured() && i.product_id.as_deref() == Some(product.id.as_str())
        }) {
            let requested = existing.quantity + quantity;
            if requested > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            existing.quantity = requested;
            return Ok(existing.line_id.clone());
        }

        validate_cart_size(self.items.len())?;
        let line = build_line(product, &LineSelection {
            quantity,
            ..LineSelection::default()
        })?;
        let line_id = line.line_id.clone();
        self.items.push(line);
        Ok(line_id)
    }

    /// Sets a line's quantity; zero or less removes it.
    pub fn set_quantity(&mut self, line_id: &str, quantity: i64) -> CoreResult<()> {
        let idx = self.position(line_id)?;
        if self.items[idx].is_reward {
            return Err(CoreError::RewardLineLocked(line_id.to_string()));
        }
        if quantity <= 0 {
            self.items.remove(idx);
            return Ok(());
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        self.items[idx].quantity = quantity;
        Ok(())
    }

    /// Removes a line. Removing the reward line also drops the applied reward.
    pub fn remove_line(&mut self, line_id: &str) -> CoreResult<CartItem> {
        let idx = self.position(line_id)?;
        let removed = self.items.remove(idx);
        if removed.is_reward {
            self.applied_reward = None;
        }
        Ok(removed)
    }

    /// Empties the cart and resets discount, reward and metadata.
    pub fn clear(&mut self) {
        *self = Cart::default();
    }

    // -------------------------------------------------------------------------
    // Discounts
    // -------------------------------------------------------------------------

    pub fn apply_line_discount(&mut self, line_id: &str, discount: Discount) -> CoreResult<()> {
        validate_discount(&discount)?;
        let idx = self.position(line_id)?;
        if self.items[idx].is_reward {
            return Err(CoreError::RewardLineLocked(line_id.to_string()));
        }
        self.items[idx].discount = Some(discount);
        Ok(())
    }

    pub fn remove_line_discount(&mut self, line_id: &str) -> CoreResult<()> {
        let idx = self.position(line_id)?;
        self.items[idx].discount = None;
        Ok(())
    }

    pub fn apply_cart_discount(&mut self, discount: Discount) -> CoreResult<()> {
        validate_discount(&discount)?;
        self.discount = Some(discount);
        Ok(())
    }

    pub fn remove_cart_discount(&mut self) {
        self.discount = None;
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    pub fn set_metadata(&mut self, metadata: OrderMetadata) -> CoreResult<()> {
        let order_type = validate_name("order type", &metadata.order_type)?;
        self.metadata = OrderMetadata {
            order_type,
            ..metadata
        };
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rewards
    // -------------------------------------------------------------------------

    /// Places a validated reward line, replacing any earlier reward line.
    pub fn apply_reward(&mut self, reward: Reward, customer_id: &str, line: CartItem) -> CoreResult<()> {
        let purchased = self.items.iter().filter(|i| !i.is_reward).count();
        validate_cart_size(purchased)?;

        self.remove_reward();
        self.applied_reward = Some(AppliedReward {
            reward,
            customer_id: customer_id.to_string(),
            line_id: line.line_id.clone(),
        });
        self.items.push(line);
        Ok(())
    }

    /// Drops the reward line and the applied reward, if any.
    pub fn remove_reward(&mut self) {
        self.items.retain(|i| !i.is_reward);
        self.applied_reward = None;
    }

    // -------------------------------------------------------------------------
    // Held-cart support
    // -------------------------------------------------------------------------

    /// Loads a held snapshot as the working order. Cart discount and reward
    /// are per-session and start empty.
    pub(crate) fn load(&mut self, items: Vec<CartItem>, metadata: OrderMetadata) {
        self.items = items;
        self.discount = None;
        self.applied_reward = None;
        self.metadata = metadata;
    }

    fn position(&self, line_id: &str) -> CoreResult<usize> {
        self.items
            .iter()
            .position(|i| i.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))
    }
}

fn has_options(selection: &LineSelection) -> bool {
    !selection.addon_ids.is_empty()
        || selection.variant_id.is_some()
        || !selection.modifiers.is_empty()
}

/// Builds a new line from a product and a validated selection.
fn build_line(product: &Product, selection: &LineSelection) -> CoreResult<CartItem> {
    let variant: Option<Variant> = match &selection.variant_id {
        Some(id) => Some(
            product
                .variants
                .iter()
                .find(|v| &v.id == id)
                .cloned()
                .ok_or_else(|| ValidationError::UnknownOption {
                    field: "variant".to_string(),
                    value: id.clone(),
                })?,
        ),
        None if !product.variants.is_empty() => {
            return Err(ValidationError::Required {
                field: "variant".to_string(),
            }
            .into())
        }
        None => None,
    };

    let addons = selection
        .addon_ids
        .iter()
        .map(|id| {
            product
                .addons
                .iter()
                .find(|a| &a.id == id)
                .cloned()
                .ok_or_else(|| ValidationError::UnknownOption {
                    field: "addon".to_string(),
                    value: id.clone(),
                })
        })
        .collect::<Result<Vec<Addon>, _>>()?;

    validate_modifier_selection(&product.modifier_groups, &selection.modifiers)?;
    let modifiers = selection
        .modifiers
        .iter()
        .filter_map(|(group_id, option_id)| {
            let group = product.modifier_groups.iter().find(|g| &g.id == group_id)?;
            let option = group.options.iter().find(|o| &o.id == option_id)?;
            Some(SelectedModifier {
                group_id: group.id.clone(),
                group_name: group.name.clone(),
                option: option.clone(),
            })
        })
        .collect();

    let (name, unit_price, cost_price) = match &variant {
        Some(v) => (
            format!("{} ({})", product.name, v.name),
            v.price,
            v.cost.or(product.cost_price),
        ),
        None => (product.name.clone(), product.price, product.cost_price),
    };

    Ok(CartItem {
        line_id: Uuid::new_v4().to_string(),
        product_id: Some(product.id.clone()),
        name,
        unit_price,
        cost_price,
        categories: product.categories.clone(),
        tax_rate: product.tax_rate,
        quantity: selection.quantity,
        addons,
        variant,
        modifiers,
        discount: None,
        is_reward: false,
        reward_id: None,
        recipe: product.recipe.clone(),
        added_at: Utc::now(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{customer, product, stocked};
    use crate::loyalty::redeem;
    use crate::money::{Money, Rate};
    use crate::types::{ModifierGroup, ModifierOption, RewardKind};
    use crate::MAX_CART_ITEMS;

    fn no_inventory() -> InventoryConfig {
        InventoryConfig::default()
    }

    fn add(cart: &mut Cart, p: &Product) -> String {
        cart.add_product(p, None, &no_inventory(), &Inventory::default())
            .unwrap()
    }

    fn discount_reward(id: &str, value: i64) -> Reward {
        Reward {
            id: id.to_string(),
            name: id.to_string(),
            points_cost: 10,
            kind: RewardKind::DiscountAmount {
                value: Money::from_minor(value),
            },
        }
    }

    fn apply(cart: &mut Cart, reward: Reward) {
        let line = redeem(&reward, &customer("c1", 100), &Inventory::default(), Utc::now()).unwrap();
        cart.apply_reward(reward, "c1", line).unwrap();
    }

    fn coffee_with_options() -> Product {
        let mut p = product("kopi", "Kopi", 20_000);
        p.addons = vec![Addon {
            id: "shot".to_string(),
            name: "Extra Shot".to_string(),
            price: Money::from_minor(5_000),
            cost: Some(Money::from_minor(2_000)),
        }];
        p.variants = vec![Variant {
            id: "large".to_string(),
            name: "Large".to_string(),
            price: Money::from_minor(25_000),
            cost: Some(Money::from_minor(8_000)),
        }];
        p.modifier_groups = vec![ModifierGroup {
            id: "ice".to_string(),
            name: "Ice".to_string(),
            min_selection: 0,
            max_selection: 1,
            options: vec![ModifierOption {
                id: "less-ice".to_string(),
                name: "Less ice".to_string(),
                price: Money::zero(),
                cost: None,
            }],
        }];
        p
    }

    #[test]
    fn test_add_same_product_increments() {
        let mut cart = Cart::new();
        let p = product("teh", "Es Teh", 8_000);

        let first = add(&mut cart, &p);
        let second = add(&mut cart, &p);

        assert_eq!(first, second);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn test_configured_product_always_new_line() {
        let mut cart = Cart::new();
        let p = coffee_with_options();
        let selection = LineSelection {
            addon_ids: vec!["shot".to_string()],
            variant_id: Some("large".to_string()),
            modifiers: vec![("ice".to_string(), "less-ice".to_string())],
            quantity: 1,
        };

        let a = cart
            .add_product(&p, Some(&selection), &no_inventory(), &Inventory::default())
            .unwrap();
        let b = cart
            .add_product(&p, Some(&selection), &no_inventory(), &Inventory::default())
            .unwrap();

        assert_ne!(a, b);
        let line = cart.line(&a).unwrap();
        assert_eq!(line.name, "Kopi (Large)");
        assert_eq!(line.gross().minor(), 30_000);
        assert_eq!(line.cost_price, Some(Money::from_minor(8_000)));
    }

    #[test]
    fn test_missing_variant_rejected() {
        let mut cart = Cart::new();
        let err = cart
            .add_product(&coffee_with_options(), None, &no_inventory(), &Inventory::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_unavailable_product_blocked() {
        let mut cart = Cart::new();
        let p = stocked("air", "Air Mineral", 5_000, 0);
        let config = InventoryConfig {
            enabled: true,
            ..InventoryConfig::default()
        };
        let err = cart
            .add_product(&p, None, &config, &Inventory::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::ProductUnavailable { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity() {
        let mut cart = Cart::new();
        let line = add(&mut cart, &product("teh", "Es Teh", 8_000));

        cart.set_quantity(&line, 5).unwrap();
        assert_eq!(cart.items()[0].quantity, 5);

        assert!(matches!(
            cart.set_quantity(&line, MAX_ITEM_QUANTITY + 1),
            Err(CoreError::QuantityTooLarge { .. })
        ));

        cart.set_quantity(&line, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_reward_line_quantity_locked() {
        let mut cart = Cart::new();
        add(&mut cart, &product("teh", "Es Teh", 8_000));
        apply(&mut cart, discount_reward("A", 5_000));
        let reward_line = cart.applied_reward().unwrap().line_id.clone();

        assert!(matches!(
            cart.set_quantity(&reward_line, 3),
            Err(CoreError::RewardLineLocked(_))
        ));
        assert!(cart
            .apply_line_discount(&reward_line, Discount::amount(Money::from_minor(1)))
            .is_err());
    }

    #[test]
    fn test_reward_exclusivity() {
        let mut cart = Cart::new();
        add(&mut cart, &product("teh", "Es Teh", 8_000));

        apply(&mut cart, discount_reward("A", 5_000));
        apply(&mut cart, discount_reward("B", 3_000));

        let rewards: Vec<_> = cart.items().iter().filter(|i| i.is_reward).collect();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].reward_id.as_deref(), Some("B"));
        assert_eq!(cart.applied_reward().unwrap().reward.id, "B");
    }

    #[test]
    fn test_removing_reward_line_clears_applied_reward() {
        let mut cart = Cart::new();
        add(&mut cart, &product("teh", "Es Teh", 8_000));
        apply(&mut cart, discount_reward("A", 5_000));
        let line_id = cart.applied_reward().unwrap().line_id.clone();

        cart.remove_line(&line_id).unwrap();
        assert!(cart.applied_reward().is_none());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut cart = Cart::new();
        add(&mut cart, &product("teh", "Es Teh", 8_000));
        cart.apply_cart_discount(Discount::percentage(Rate::from_percent(10)))
            .unwrap();
        apply(&mut cart, discount_reward("A", 1_000));
        cart.set_metadata(OrderMetadata {
            order_type: "take-away".to_string(),
            table: Some("7".to_string()),
            guest_count: Some(2),
        })
        .unwrap();

        cart.clear();

        assert!(cart.is_empty());
        assert!(cart.discount().is_none());
        assert!(cart.applied_reward().is_none());
        assert_eq!(cart.metadata(), &OrderMetadata::default());
    }

    #[test]
    fn test_negative_discount_rejected() {
        let mut cart = Cart::new();
        let line = add(&mut cart, &product("teh", "Es Teh", 8_000));
        assert!(cart
            .apply_line_discount(&line, Discount::amount(Money::from_minor(-500)))
            .is_err());
        assert!(cart.line(&line).unwrap().discount.is_none());
    }

    #[test]
    fn test_cart_line_limit() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            add(&mut cart, &product(&format!("p{i}"), "Item", 1_000));
        }
        let err = cart
            .add_product(
                &product("overflow", "Item", 1_000),
                None,
                &no_inventory(),
                &Inventory::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_totals_use_cart_discount() {
        let mut cart = Cart::new();
        let line = add(&mut cart, &product("nasi", "Nasi Goreng", 25_000));
        cart.set_quantity(&line, 2).unwrap();
        cart.apply_cart_discount(Discount::amount(Money::from_minor(10_000)))
            .unwrap();

        let totals = cart.totals(&TaxConfig::default());
        assert_eq!(totals.subtotal.minor(), 50_000);
        assert_eq!(totals.cart_discount_total.minor(), 10_000);
        assert_eq!(totals.final_total.minor(), 40_000);
    }
}
