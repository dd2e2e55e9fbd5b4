//! # Availability Checker
//!
//! Decides whether a product can be added to the cart right now.
//!
//! ## Rules (first match wins)
//! ```text
//! inventory disabled ───────────────────────────────► available
//! track_ingredients && recipe non-empty ────────────► every component covered?
//!                                                       no  → ingredients depleted /
//!                                                             component missing /
//!                                                             component stock low
//! product.track_stock ──────────────────────────────► stock > 0 ? : stock depleted
//! otherwise ────────────────────────────────────────► available (untracked)
//! ```
//!
//! A bundled component that is untracked but has its own recipe is checked
//! one level deep.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::inventory::Inventory;
use crate::types::{InventoryConfig, Product, RecipeItem};

/// Why a product cannot be sold right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailableReason {
    IngredientsDepleted,
    StockDepleted,
    ComponentMissing { product_id: String },
    ComponentStockLow { name: String },
    ComponentUnavailable { name: String },
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::IngredientsDepleted => write!(f, "ingredients depleted"),
            UnavailableReason::StockDepleted => write!(f, "stock depleted"),
            UnavailableReason::ComponentMissing { product_id } => {
                write!(f, "component {product_id} missing")
            }
            UnavailableReason::ComponentStockLow { name } => write!(f, "{name} stock low"),
            UnavailableReason::ComponentUnavailable { name } => {
                write!(f, "component {name} unavailable")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Availability {
    pub available: bool,
    pub reason: Option<UnavailableReason>,
}

impl Availability {
    pub fn available() -> Self {
        Availability {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Availability {
            available: false,
            reason: Some(reason),
        }
    }
}

/// Checks whether `product` can be added under `config` and current stock.
pub fn check_availability(
    product: &Product,
    config: &InventoryConfig,
    inventory: &Inventory,
) -> Availability {
    if !config.enabled {
        return Availability::available();
    }
    check_at_depth(product, config, inventory, 0)
}

fn check_at_depth(
    product: &Product,
    config: &InventoryConfig,
    inventory: &Inventory,
    depth: u8,
) -> Availability {
    if config.track_ingredients && product.has_recipe() {
        return match recipe_shortfall(&product.recipe, config, inventory, depth) {
            Some(reason) => Availability::unavailable(reason),
            None => Availability::available(),
        };
    }

    if product.track_stock && product.stock_level() <= 0 {
        return Availability::unavailable(UnavailableReason::StockDepleted);
    }

    Availability::available()
}

fn recipe_shortfall(
    recipe: &[RecipeItem],
    config: &InventoryConfig,
    inventory: &Inventory,
    depth: u8,
) -> Option<UnavailableReason> {
    for component in recipe {
        match component {
            RecipeItem::RawMaterial {
                raw_material_id,
                quantity,
            } => {
                let covered = inventory
                    .raw_material(raw_material_id)
                    .is_some_and(|m| m.stock >= *quantity);
                if !covered {
                    return Some(UnavailableReason::IngredientsDepleted);
                }
            }
            RecipeItem::Product {
                product_id,
                quantity,
            } => {
                let Some(bundled) = inventory.product(product_id) else {
                    return Some(UnavailableReason::ComponentMissing {
                        product_id: product_id.clone(),
                    });
                };
                if bundled.track_stock && bundled.stock_level() < *quantity {
                    return Some(UnavailableReason::ComponentStockLow {
                        name: bundled.name.clone(),
                    });
                }
                if depth == 0 && !bundled.track_stock && bundled.has_recipe() {
                    let nested = check_at_depth(bundled, config, inventory, depth + 1);
                    if !nested.available {
                        return Some(UnavailableReason::ComponentUnavailable {
                            name: bundled.name.clone(),
                        });
                    }
                }
            }
        }
    }
    None
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{product, raw_material};

    fn config(enabled: bool, ingredients: bool) -> InventoryConfig {
        InventoryConfig {
            enabled,
            track_ingredients: ingredients,
            strict_stock: false,
        }
    }

    fn latte(milk_per_cup: i64) -> Product {
        let mut p = product("latte", "Latte", 28_000);
        p.recipe = vec![RecipeItem::RawMaterial {
            raw_material_id: "milk".to_string(),
            quantity: milk_per_cup,
        }];
        p
    }

    #[test]
    fn test_disabled_inventory_always_available() {
        let mut p = product("p1", "Es Teh", 8_000);
        p.track_stock = true;
        p.stock = Some(0);
        let inventory = Inventory::default();
        assert!(check_availability(&p, &config(false, false), &inventory).available);
    }

    #[test]
    fn test_recipe_check() {
        let inventory = Inventory::new(vec![], vec![raw_material("milk", "Susu", 150, 20)]);

        assert!(check_availability(&latte(150), &config(true, true), &inventory).available);

        let result = check_availability(&latte(200), &config(true, true), &inventory);
        assert!(!result.available);
        assert_eq!(result.reason, Some(UnavailableReason::IngredientsDepleted));
    }

    #[test]
    fn test_missing_material_means_depleted() {
        let inventory = Inventory::default();
        let result = check_availability(&latte(10), &config(true, true), &inventory);
        assert_eq!(result.reason, Some(UnavailableReason::IngredientsDepleted));
    }

    #[test]
    fn test_recipe_takes_precedence_over_stock() {
        let inventory = Inventory::new(vec![], vec![raw_material("milk", "Susu", 500, 20)]);
        let mut p = latte(100);
        p.track_stock = true;
        p.stock = Some(0);
        assert!(check_availability(&p, &config(true, true), &inventory).available);

        // Recipe tracking off: falls through to simple stock.
        let result = check_availability(&p, &config(true, false), &inventory);
        assert_eq!(result.reason, Some(UnavailableReason::StockDepleted));
    }

    #[test]
    fn test_simple_stock() {
        let mut p = product("p1", "Air Mineral", 5_000);
        p.track_stock = true;
        p.stock = Some(1);
        let inventory = Inventory::default();
        assert!(check_availability(&p, &config(true, false), &inventory).available);

        p.stock = None;
        assert!(!check_availability(&p, &config(true, false), &inventory).available);
    }

    #[test]
    fn test_untracked_product_available() {
        let p = product("p1", "Kerupuk", 2_000);
        assert!(check_availability(&p, &config(true, true), &Inventory::default()).available);
    }

    #[test]
    fn test_bundled_components() {
        let mut drink = product("drink", "Es Jeruk", 10_000);
        drink.track_stock = true;
        drink.stock = Some(1);

        let mut combo = product("combo", "Paket Hemat", 35_000);
        combo.recipe = vec![RecipeItem::Product {
            product_id: "drink".to_string(),
            quantity: 2,
        }];

        let cfg = config(true, true);
        let inventory = Inventory::new(vec![drink.clone()], vec![]);
        assert_eq!(
            check_availability(&combo, &cfg, &inventory).reason,
            Some(UnavailableReason::ComponentStockLow {
                name: "Es Jeruk".to_string()
            })
        );

        let empty = Inventory::default();
        assert!(matches!(
            check_availability(&combo, &cfg, &empty).reason,
            Some(UnavailableReason::ComponentMissing { .. })
        ));
    }

    #[test]
    fn test_untracked_component_recipe_checked_one_level() {
        let mut sauce = product("sauce", "Sambal", 0);
        sauce.recipe = vec![RecipeItem::RawMaterial {
            raw_material_id: "chili".to_string(),
            quantity: 50,
        }];
        let mut plate = product("plate", "Ayam Penyet", 25_000);
        plate.recipe = vec![RecipeItem::Product {
            product_id: "sauce".to_string(),
            quantity: 1,
        }];

        let inventory = Inventory::new(vec![sauce], vec![raw_material("chili", "Cabai", 10, 50)]);
        let result = check_availability(&plate, &config(true, true), &inventory);
        assert_eq!(
            result.reason,
            Some(UnavailableReason::ComponentUnavailable {
                name: "Sambal".to_string()
            })
        );
    }
}
