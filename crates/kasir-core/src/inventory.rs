//! # Inventory Snapshot
//!
//! In-memory catalog of products and raw materials with their current stock.
//! Availability reads it; only the stock ledger writes stock into it.
//!
//! Keyed by id in `BTreeMap`s so iteration (and therefore every plan built
//! from it) is deterministic.

use std::collections::BTreeMap;

use crate::types::{Product, RawMaterial, StockTarget};

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    products: BTreeMap<String, Product>,
    raw_materials: BTreeMap<String, RawMaterial>,
}

impl Inventory {
    pub fn new(
        products: impl IntoIterator<Item = Product>,
        raw_materials: impl IntoIterator<Item = RawMaterial>,
    ) -> Self {
        Inventory {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            raw_materials: raw_materials
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect(),
        }
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn raw_material(&self, id: &str) -> Option<&RawMaterial> {
        self.raw_materials.get(id)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn raw_materials(&self) -> impl Iterator<Item = &RawMaterial> {
        self.raw_materials.values()
    }

    /// Inserts or replaces a product (catalog edits).
    pub fn upsert_product(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn upsert_raw_material(&mut self, material: RawMaterial) {
        self.raw_materials.insert(material.id.clone(), material);
    }

    pub fn contains(&self, target: &StockTarget) -> bool {
        match target {
            StockTarget::Product(id) => self.products.contains_key(id),
            StockTarget::RawMaterial(id) => self.raw_materials.contains_key(id),
        }
    }

    /// Current stock of a target; an uncounted product reads as 0.
    pub fn stock_of(&self, target: &StockTarget) -> Option<i64> {
        match target {
            StockTarget::Product(id) => self.products.get(id).map(Product::stock_level),
            StockTarget::RawMaterial(id) => self.raw_materials.get(id).map(|m| m.stock),
        }
    }

    pub fn name_of(&self, target: &StockTarget) -> Option<&str> {
        match target {
            StockTarget::Product(id) => self.products.get(id).map(|p| p.name.as_str()),
            StockTarget::RawMaterial(id) => self.raw_materials.get(id).map(|m| m.name.as_str()),
        }
    }

    /// Raw materials always track stock; products only when flagged.
    pub fn tracks_stock(&self, target: &StockTarget) -> bool {
        match target {
            StockTarget::Product(id) => self.products.get(id).is_some_and(|p| p.track_stock),
            StockTarget::RawMaterial(id) => self.raw_materials.contains_key(id),
        }
    }

    /// Writes an absolute stock level. Returns false for an unknown target.
    pub(crate) fn set_stock(&mut self, target: &StockTarget, value: i64) -> bool {
        match target {
            StockTarget::Product(id) => match self.products.get_mut(id) {
                Some(product) => {
                    product.stock = Some(value);
                    true
                }
                None => false,
            },
            StockTarget::RawMaterial(id) => match self.raw_materials.get_mut(id) {
                Some(material) => {
                    material.stock = value;
                    true
                }
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    #[test]
    fn test_stock_reads_and_writes() {
        let mut inventory = Inventory::new(
            vec![Product {
                id: "p1".to_string(),
                name: "Air Mineral".to_string(),
                price: Money::from_minor(5_000),
                cost_price: None,
                categories: vec![],
                track_stock: true,
                stock: None,
                recipe: vec![],
                addons: vec![],
                variants: vec![],
                modifier_groups: vec![],
                tax_rate: None,
                barcode: None,
            }],
            vec![RawMaterial {
                id: "rm1".to_string(),
                name: "Gula".to_string(),
                stock: 1_000,
                unit: "gram".to_string(),
                cost_per_unit: Money::from_minor(15),
            }],
        );

        let product = StockTarget::Product("p1".to_string());
        assert_eq!(inventory.stock_of(&product), Some(0));
        assert!(inventory.set_stock(&product, 12));
        assert_eq!(inventory.stock_of(&product), Some(12));

        let material = StockTarget::RawMaterial("rm1".to_string());
        assert!(inventory.tracks_stock(&material));
        assert_eq!(inventory.name_of(&material), Some("Gula"));

        assert!(!inventory.set_stock(&StockTarget::RawMaterial("nope".to_string()), 1));
    }
}
