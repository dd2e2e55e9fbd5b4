//! Test builders shared by the unit tests of this crate.

use chrono::Utc;

use crate::money::Money;
use crate::types::{Customer, Operator, Product, RawMaterial};

pub fn product(id: &str, name: &str, price: i64) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        price: Money::from_minor(price),
        cost_price: None,
        categories: vec![],
        track_stock: false,
        stock: None,
        recipe: vec![],
        addons: vec![],
        variants: vec![],
        modifier_groups: vec![],
        tax_rate: None,
        barcode: None,
    }
}

pub fn stocked(id: &str, name: &str, price: i64, stock: i64) -> Product {
    Product {
        track_stock: true,
        stock: Some(stock),
        ..product(id, name, price)
    }
}

pub fn raw_material(id: &str, name: &str, stock: i64, cost_per_unit: i64) -> RawMaterial {
    RawMaterial {
        id: id.to_string(),
        name: name.to_string(),
        stock,
        unit: "gram".to_string(),
        cost_per_unit: Money::from_minor(cost_per_unit),
    }
}

pub fn customer(id: &str, points: i64) -> Customer {
    Customer {
        id: id.to_string(),
        member_code: format!("M-{id}"),
        name: "Budi".to_string(),
        contact: None,
        points,
        created_at: Utc::now(),
    }
}

pub fn operator() -> Operator {
    Operator {
        id: "op-1".to_string(),
        name: "Sari".to_string(),
    }
}
