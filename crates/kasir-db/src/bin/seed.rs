//! # Seed Data Generator
//!
//! Populates the database with a small café catalog for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p kasir-db --bin seed
//!
//! # Specify database path
//! cargo run -p kasir-db --bin seed -- --db ./data/kasir.db
//! ```
//!
//! ## Generated Data
//! - Raw materials: espresso beans, milk, tea leaves, sugar syrup
//! - Drinks with recipes, a latte with size variants and a sugar-level
//!   modifier group
//! - Packaged snacks with tracked stock and barcodes
//! - Two members, a spend rule, an item rule and two rewards
//! - A scheduled "Happy Hour" discount

use chrono::Utc;
use kasir_core::{
    Addon, Customer, DiscountDefinition, DiscountKind, ModifierGroup, ModifierOption, Money,
    PointRule, PointRuleKind, Product, RawMaterial, RecipeItem, Reward, RewardKind, RuleTarget,
    Variant,
};
use kasir_db::{Database, DbConfig};
use std::env;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (id, name, stock, unit, cost per unit)
const RAW_MATERIALS: &[(&str, &str, i64, &str, i64)] = &[
    ("rm-espresso", "Biji Espresso", 5_000, "gram", 250),
    ("rm-milk", "Susu Segar", 20_000, "ml", 22),
    ("rm-tea", "Daun Teh", 2_000, "gram", 120),
    ("rm-syrup", "Sirup Gula", 3_000, "ml", 15),
];

/// (id, name, price, recipe of (raw material, quantity))
const DRINKS: &[(&str, &str, i64, &[(&str, i64)])] = &[
    ("p-espresso", "Espresso", 18_000, &[("rm-espresso", 18)]),
    ("p-americano", "Americano", 22_000, &[("rm-espresso", 18)]),
    (
        "p-latte",
        "Caffe Latte",
        28_000,
        &[("rm-espresso", 18), ("rm-milk", 150)],
    ),
    ("p-teh", "Teh Manis", 8_000, &[("rm-tea", 5), ("rm-syrup", 20)]),
];

/// (id, name, price, cost, stock, barcode)
const SNACKS: &[(&str, &str, i64, i64, i64, &str)] = &[
    ("p-croissant", "Croissant", 20_000, 9_000, 24, "8991002101234"),
    ("p-cookie", "Choco Cookie", 12_000, 4_500, 40, "8991002105678"),
    ("p-water", "Air Mineral", 6_000, 2_500, 60, "8996001600146"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,kasir_db=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./kasir_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kasir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./kasir_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kasir Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let catalog = db.catalog();

    for (id, name, stock, unit, cost) in RAW_MATERIALS {
        catalog
            .upsert_raw_material(&RawMaterial {
                id: id.to_string(),
                name: name.to_string(),
                stock: *stock,
                unit: unit.to_string(),
                cost_per_unit: Money::from_minor(*cost),
            })
            .await?;
    }
    println!("✓ {} raw materials", RAW_MATERIALS.len());

    for (id, name, price, recipe) in DRINKS {
        let mut product = base_product(id, name, *price, "minuman");
        product.recipe = recipe
            .iter()
            .map(|(material, quantity)| RecipeItem::RawMaterial {
                raw_material_id: material.to_string(),
                quantity: *quantity,
            })
            .collect();
        if *id == "p-latte" {
            dress_latte(&mut product);
        }
        catalog.upsert_product(&product).await?;
    }
    println!("✓ {} drinks", DRINKS.len());

    for (id, name, price, cost, stock, barcode) in SNACKS {
        let mut product = base_product(id, name, *price, "makanan");
        product.cost_price = Some(Money::from_minor(*cost));
        product.track_stock = true;
        product.stock = Some(*stock);
        product.barcode = Some(barcode.to_string());
        catalog.upsert_product(&product).await?;
    }
    println!("✓ {} snacks", SNACKS.len());

    seed_loyalty(&db).await?;
    println!("✓ Members, point rules, rewards and discounts");

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn base_product(id: &str, name: &str, price: i64, category: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        price: Money::from_minor(price),
        cost_price: None,
        categories: vec![category.to_string()],
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

/// Sizes, an extra shot and a required sugar level.
fn dress_latte(product: &mut Product) {
    product.variants = vec![
        Variant {
            id: "v-regular".to_string(),
            name: "Regular".to_string(),
            price: Money::from_minor(28_000),
            cost: None,
        },
        Variant {
            id: "v-large".to_string(),
            name: "Large".to_string(),
            price: Money::from_minor(34_000),
            cost: Some(Money::from_minor(9_500)),
        },
    ];
    product.addons = vec![Addon {
        id: "a-shot".to_string(),
        name: "Extra Shot".to_string(),
        price: Money::from_minor(5_000),
        cost: Some(Money::from_minor(4_500)),
    }];
    product.modifier_groups = vec![ModifierGroup {
        id: "mg-sugar".to_string(),
        name: "Gula".to_string(),
        min_selection: 1,
        max_selection: 1,
        options: ["Normal", "Less", "Tanpa Gula"]
            .iter()
            .enumerate()
            .map(|(i, name)| ModifierOption {
                id: format!("mo-sugar-{i}"),
                name: name.to_string(),
                price: Money::zero(),
                cost: None,
            })
            .collect(),
    }];
}

async fn seed_loyalty(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();

    for (code, name, points) in [("M-0001", "Budi Santoso", 120), ("M-0002", "Siti Rahma", 15)] {
        db.customers()
            .upsert(&Customer {
                id: Uuid::new_v4().to_string(),
                member_code: code.to_string(),
                name: name.to_string(),
                contact: Some("0812-0000-0000".to_string()),
                points,
                created_at: now,
            })
            .await?;
    }

    let loyalty = db.loyalty();
    loyalty
        .upsert_point_rule(&PointRule {
            id: "rule-spend".to_string(),
            description: "1 poin per Rp10.000".to_string(),
            kind: PointRuleKind::Spend {
                threshold: Money::from_minor(10_000),
                points: 1,
            },
        })
        .await?;
    loyalty
        .upsert_point_rule(&PointRule {
            id: "rule-coffee".to_string(),
            description: "Bonus 2 poin per minuman".to_string(),
            kind: PointRuleKind::Item {
                target: RuleTarget::Category("minuman".to_string()),
                points_per_item: 2,
            },
        })
        .await?;

    loyalty
        .upsert_reward(&Reward {
            id: "rw-free-espresso".to_string(),
            name: "Espresso Gratis".to_string(),
            points_cost: 50,
            kind: RewardKind::FreeProduct {
                product_id: "p-espresso".to_string(),
            },
        })
        .await?;
    loyalty
        .upsert_reward(&Reward {
            id: "rw-10k".to_string(),
            name: "Potongan Rp10.000".to_string(),
            points_cost: 30,
            kind: RewardKind::DiscountAmount {
                value: Money::from_minor(10_000),
            },
        })
        .await?;

    loyalty
        .upsert_discount_definition(&DiscountDefinition {
            id: "disc-happy-hour".to_string(),
            name: "Happy Hour".to_string(),
            kind: DiscountKind::Percentage(kasir_core::Rate::from_percent(20)),
            valid_from: Some(now),
            valid_until: Some(now + chrono::Duration::days(30)),
            is_active: true,
        })
        .await?;

    Ok(())
}
