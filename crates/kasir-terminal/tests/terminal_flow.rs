//! End-to-end terminal tests against an in-memory SQLite database.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kasir_core::{
    CommitError, CommitRequest, Customer, Money, Operator, PaymentInput, PaymentStatus, PointRule,
    PointRuleKind, Product, RawMaterial, RecipeItem, Reward, RewardKind, StateChange, StockCount,
    StockTarget,
};
use kasir_db::{Database, DbConfig, DbError, DbResult, StateStore};
use kasir_terminal::{Terminal, TerminalConfig, TerminalError};

// =============================================================================
// Fixtures
// =============================================================================

fn product(id: &str, name: &str, price: i64) -> Product {
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

async fn seeded_db() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let catalog = db.catalog();

    catalog
        .upsert_raw_material(&RawMaterial {
            id: "rm-beans".to_string(),
            name: "Beans".to_string(),
            stock: 100,
            unit: "gram".to_string(),
            cost_per_unit: Money::from_minor(250),
        })
        .await
        .unwrap();

    let mut croissant = product("p-croissant", "Croissant", 20_000);
    croissant.track_stock = true;
    croissant.stock = Some(10);
    catalog.upsert_product(&croissant).await.unwrap();

    let mut espresso = product("p-espresso", "Espresso", 18_000);
    espresso.recipe = vec![RecipeItem::RawMaterial {
        raw_material_id: "rm-beans".to_string(),
        quantity: 18,
    }];
    catalog.upsert_product(&espresso).await.unwrap();

    db.customers()
        .upsert(&Customer {
            id: "c-budi".to_string(),
            member_code: "M-0001".to_string(),
            name: "Budi".to_string(),
            contact: None,
            points: 120,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let loyalty = db.loyalty();
    loyalty
        .upsert_point_rule(&PointRule {
            id: "rule-spend".to_string(),
            description: "1 point per 10,000".to_string(),
            kind: PointRuleKind::Spend {
                threshold: Money::from_minor(10_000),
                points: 1,
            },
        })
        .await
        .unwrap();
    loyalty
        .upsert_reward(&Reward {
            id: "rw-espresso".to_string(),
            name: "Free Espresso".to_string(),
            points_cost: 50,
            kind: RewardKind::FreeProduct {
                product_id: "p-espresso".to_string(),
            },
        })
        .await
        .unwrap();

    db
}

fn fast_config() -> TerminalConfig {
    let mut config = TerminalConfig::default();
    config.persist.max_retries = 1;
    config.persist.initial_backoff_ms = 1;
    config.persist.max_backoff_ms = 2;
    config
}

fn cashier() -> Operator {
    Operator {
        id: "op-ani".to_string(),
        name: "Ani".to_string(),
    }
}

fn cash(amount: i64) -> CommitRequest {
    CommitRequest {
        payments: vec![PaymentInput::cash(Money::from_minor(amount))],
        ..Default::default()
    }
}

async fn open(db: &Database, config: TerminalConfig) -> Terminal {
    let terminal = Terminal::open_with(config, db.clone()).await.unwrap();
    terminal.sign_in(cashier());
    terminal
}

async fn croissant_stock(db: &Database) -> Option<i64> {
    db.catalog().get_product("p-croissant").await.unwrap().unwrap().stock
}

// =============================================================================
// Commit & Refund
// =============================================================================

#[tokio::test]
async fn test_commit_is_persisted_and_survives_restart() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;

    let line = terminal.add_product("p-croissant", None).unwrap();
    terminal.with_cart_mut(|cart| cart.set_quantity(&line, 2)).unwrap().unwrap();
    let tx = terminal.commit(&cash(50_000)).unwrap();
    terminal.flush().await.unwrap();

    assert_eq!(tx.total, Money::from_minor(40_000));
    assert_eq!(tx.payment_status, PaymentStatus::Paid);
    assert!(terminal.with_state(|s| s.cart.is_empty()));

    let stored = db.transactions().get(&tx.id).await.unwrap().unwrap();
    assert_eq!(stored.receipt_number, tx.receipt_number);
    assert_eq!(croissant_stock(&db).await, Some(8));

    terminal.close().await.unwrap();

    // A fresh terminal continues the receipt sequence
    let reopened = open(&db, fast_config()).await;
    assert!(reopened.transaction(&tx.id).is_some());
    reopened.add_product("p-croissant", None).unwrap();
    let next = reopened.commit(&cash(20_000)).unwrap();
    assert_ne!(next.receipt_number, tx.receipt_number);
    assert!(next.receipt_number > tx.receipt_number);
}

#[tokio::test]
async fn test_refund_restores_stock_and_points() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;

    terminal.add_product("p-croissant", None).unwrap();
    terminal.add_product("p-croissant", None).unwrap();
    terminal.apply_reward("rw-espresso", "c-budi").unwrap();
    let tx = terminal.commit(&cash(40_000)).unwrap();
    terminal.flush().await.unwrap();

    // 120 - 50 redeemed + 4 earned
    let budi = db.customers().get("c-budi").await.unwrap().unwrap();
    assert_eq!(budi.points, 74);
    let beans = db.catalog().list_raw_materials().await.unwrap();
    assert_eq!(beans[0].stock, 100, "free reward line does not deplete");

    let refunded = terminal.refund(&tx.id).unwrap();
    terminal.flush().await.unwrap();

    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    assert_eq!(croissant_stock(&db).await, Some(10));
    let budi = db.customers().get("c-budi").await.unwrap().unwrap();
    assert_eq!(budi.points, 120);

    assert!(matches!(
        terminal.refund(&tx.id),
        Err(TerminalError::Core(_))
    ));
}

#[tokio::test]
async fn test_commit_requires_operator() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;
    terminal.sign_out();

    terminal.add_product("p-espresso", None).unwrap();
    let err = terminal.commit(&cash(18_000)).unwrap_err();

    assert!(matches!(err, TerminalError::Commit(CommitError::NoOperator)));
    assert_eq!(terminal.with_state(|s| s.cart.items().len()), 1);
    assert_eq!(terminal.with_state(|s| s.transactions.len()), 0);
}

#[tokio::test]
async fn test_partial_payment_then_settled() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;

    terminal.add_product("p-croissant", None).unwrap();
    let request = CommitRequest {
        payments: vec![PaymentInput::cash(Money::from_minor(5_000))],
        customer_name: Some("Dewi".to_string()),
        ..Default::default()
    };
    let tx = terminal.commit(&request).unwrap();
    assert_eq!(tx.payment_status, PaymentStatus::Partial);

    let settled = terminal
        .add_payment(&tx.id, &[PaymentInput::non_cash(Money::from_minor(15_000))])
        .unwrap();
    terminal.flush().await.unwrap();

    assert_eq!(settled.payment_status, PaymentStatus::Paid);
    let stored = db.transactions().get(&tx.id).await.unwrap().unwrap();
    assert_eq!(stored.payments.len(), 2);
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
}

// =============================================================================
// Held Carts
// =============================================================================

#[tokio::test]
async fn test_held_cart_survives_restart_and_retires_on_commit() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;

    terminal.add_product("p-espresso", None).unwrap();
    terminal.hold_cart("Table 4").unwrap();
    terminal.switch_cart(None).unwrap();
    terminal.flush().await.unwrap();
    terminal.close().await.unwrap();

    let reopened = open(&db, fast_config()).await;
    let held = reopened.held_carts();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].name, "Table 4");

    reopened.switch_cart(Some(held[0].id.as_str())).unwrap();
    assert_eq!(reopened.with_state(|s| s.cart.items().len()), 1);

    reopened.commit(&cash(18_000)).unwrap();
    reopened.flush().await.unwrap();

    assert!(reopened.held_carts().is_empty());
    assert!(db.held_carts().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_held_cart_edits_are_saved() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;

    let line = terminal.add_product("p-espresso", None).unwrap();
    terminal.hold_cart("Table 2").unwrap();
    terminal
        .with_cart_mut(|cart| cart.set_quantity(&line, 3))
        .unwrap()
        .unwrap();
    terminal.flush().await.unwrap();

    let stored = db.held_carts().list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].items.len(), 1);
    assert_eq!(stored[0].items[0].quantity, 3);
    assert_eq!(terminal.held_carts()[0].items[0].quantity, 3);
}

#[tokio::test]
async fn test_cart_holding_can_be_disabled() {
    let db = seeded_db().await;
    let mut config = fast_config();
    config.session.enable_cart_holding = false;
    let terminal = open(&db, config).await;

    terminal.add_product("p-espresso", None).unwrap();
    assert!(matches!(
        terminal.hold_cart("Table 1"),
        Err(TerminalError::CartHoldingDisabled)
    ));
    assert!(terminal.held_carts().is_empty());
}

#[tokio::test]
async fn test_rewards_rejected_when_loyalty_disabled() {
    let db = seeded_db().await;
    let mut config = fast_config();
    config.loyalty.enabled = false;
    let terminal = open(&db, config).await;

    assert!(matches!(
        terminal.apply_reward("rw-espresso", "c-budi"),
        Err(TerminalError::LoyaltyDisabled)
    ));

    terminal.add_product("p-croissant", None).unwrap();
    let tx = terminal
        .commit(&CommitRequest {
            customer_id: Some("c-budi".to_string()),
            ..cash(20_000)
        })
        .unwrap();
    assert_eq!(tx.points_earned, 0);
}

// =============================================================================
// Stock
// =============================================================================

#[tokio::test]
async fn test_stock_adjust_and_reconcile() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;
    let target = StockTarget::Product("p-croissant".to_string());

    terminal.adjust_stock(&target, 5, "Delivery").unwrap();
    let adjusted = terminal
        .reconcile_stock(&[
            StockCount {
                target: target.clone(),
                counted: 12,
            },
            StockCount {
                target: StockTarget::RawMaterial("rm-beans".to_string()),
                counted: 100,
            },
        ])
        .unwrap();
    terminal.flush().await.unwrap();

    assert_eq!(adjusted, 1);
    assert_eq!(croissant_stock(&db).await, Some(12));
    assert_eq!(db.stock().adjustments_for(&target).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_stock_adjust_requires_operator() {
    let db = seeded_db().await;
    let terminal = open(&db, fast_config()).await;
    terminal.sign_out();

    let target = StockTarget::Product("p-croissant".to_string());
    assert!(matches!(
        terminal.adjust_stock(&target, 1, "Found one"),
        Err(TerminalError::Commit(CommitError::NoOperator))
    ));
}

// =============================================================================
// Persistence Failures
// =============================================================================

/// Real database behind a switch that rejects the next `n` writes.
struct OutageStore {
    db: Database,
    failures: AtomicU32,
}

#[async_trait]
impl StateStore for OutageStore {
    async fn apply(&self, change: &StateChange) -> DbResult<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(DbError::ConnectionFailed("disk unavailable".into()));
        }
        self.db.apply(change).await
    }
}

#[tokio::test]
async fn test_failed_write_is_reported_and_retried() {
    let db = seeded_db().await;
    let snapshot = db.load_snapshot(Utc::now().date_naive()).await.unwrap();
    let store = Arc::new(OutageStore {
        db: db.clone(),
        failures: AtomicU32::new(2),
    });
    let terminal = Terminal::with_store(fast_config(), snapshot, store);
    terminal.sign_in(cashier());

    terminal.add_product("p-croissant", None).unwrap();
    let first = terminal.commit(&cash(20_000)).unwrap();
    terminal.add_product("p-espresso", None).unwrap();
    let second = terminal.commit(&cash(18_000)).unwrap();

    // Memory moved on even though nothing reached the database
    assert!(matches!(
        terminal.flush().await,
        Err(TerminalError::PersistFailed(_))
    ));
    let health = terminal.persist_health();
    assert!(!health.is_healthy());
    assert_eq!(health.failed.as_ref().unwrap().change, "committed");
    assert_eq!(health.backlog, 1);
    assert_eq!(terminal.with_state(|s| s.transactions.len()), 2);
    assert!(db.transactions().get(&first.id).await.unwrap().is_none());

    terminal.retry_failed().unwrap();
    terminal.flush().await.unwrap();

    assert!(terminal.persist_health().is_healthy());
    assert!(db.transactions().get(&first.id).await.unwrap().is_some());
    assert!(db.transactions().get(&second.id).await.unwrap().is_some());
    assert_eq!(croissant_stock(&db).await, Some(9));
}
