//! # State Store
//!
//! The persistence boundary between in-memory terminal state and SQLite.
//!
//! ## One Change, One SQL Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StateChange::Committed                                                 │
//! │      BEGIN                                                              │
//! │        transactions + payments     (insert, DO NOTHING on replay)       │
//! │        stock_adjustments + levels  (insert, absolute stock)             │
//! │        customers                   (absolute balance)                   │
//! │        held_carts                  (delete retired tab)                 │
//! │      COMMIT                                                             │
//! │                                                                         │
//! │  Every write is idempotent, so the writer may retry a change that       │
//! │  failed half way without double-counting anything.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::customer::CustomerRepository;
use crate::repository::held_cart::HeldCartRepository;
use crate::repository::stock::StockRepository;
use crate::repository::transaction::TransactionRepository;
use kasir_core::receipt::ReceiptCounter;
use kasir_core::{Inventory, StateChange, StateSnapshot};

/// Durable sink for state changes.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Writes one change atomically. Applying the same change twice leaves
    /// the store as if it was applied once.
    async fn apply(&self, change: &StateChange) -> DbResult<()>;
}

#[async_trait]
impl StateStore for Database {
    async fn apply(&self, change: &StateChange) -> DbResult<()> {
        debug!(kind = change.kind(), "Applying state change");

        let mut tx = self.pool().begin().await?;

        match change {
            StateChange::Committed(receipt) => {
                TransactionRepository::insert_in(&mut tx, &receipt.transaction).await?;
                for adjustment in &receipt.adjustments {
                    StockRepository::record_in(&mut tx, adjustment).await?;
                }
                if let Some(customer) = &receipt.customer {
                    CustomerRepository::upsert_in(&mut tx, customer).await?;
                }
                if let Some(held_id) = &receipt.retired_held_cart {
                    HeldCartRepository::delete_in(&mut tx, held_id).await?;
                }
            }
            StateChange::PaymentAdded(transaction) => {
                TransactionRepository::update_in(&mut tx, transaction).await?;
            }
            StateChange::Refunded(receipt) => {
                TransactionRepository::update_in(&mut tx, &receipt.transaction).await?;
                for adjustment in &receipt.adjustments {
                    StockRepository::record_in(&mut tx, adjustment).await?;
                }
                if let Some(customer) = &receipt.customer {
                    CustomerRepository::upsert_in(&mut tx, customer).await?;
                }
            }
            StateChange::StockAdjusted(adjustments) => {
                for adjustment in adjustments {
                    StockRepository::record_in(&mut tx, adjustment).await?;
                }
            }
            StateChange::HeldCartSaved(held) => {
                HeldCartRepository::upsert_in(&mut tx, held).await?;
            }
            StateChange::HeldCartDeleted(id) => {
                HeldCartRepository::delete_in(&mut tx, id).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

impl Database {
    /// Loads every collection the terminal keeps in memory.
    ///
    /// `today` resumes the receipt counter after the last number issued
    /// today, so a restart never reuses a receipt number.
    pub async fn load_snapshot(&self, today: NaiveDate) -> DbResult<StateSnapshot> {
        let catalog = self.catalog();
        let loyalty = self.loyalty();
        let transactions = self.transactions();

        let products = catalog.list_products().await?;
        let raw_materials = catalog.list_raw_materials().await?;
        let last_receipt = transactions.last_receipt_sequence(today).await?;

        let snapshot = StateSnapshot {
            inventory: Inventory::new(products, raw_materials),
            adjustments: self.stock().list_adjustments().await?,
            customers: self.customers().list().await?,
            point_rules: loyalty.list_point_rules().await?,
            rewards: loyalty.list_rewards().await?,
            discount_definitions: loyalty.list_discount_definitions().await?,
            held_carts: self.held_carts().list().await?,
            transactions: transactions.list().await?,
            receipts: ReceiptCounter::resume(today, last_receipt),
        };

        info!(
            products = snapshot.inventory.products().count(),
            raw_materials = snapshot.inventory.raw_materials().count(),
            customers = snapshot.customers.len(),
            held_carts = snapshot.held_carts.len(),
            transactions = snapshot.transactions.len(),
            last_receipt,
            "State snapshot loaded"
        );

        Ok(snapshot)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;
    use chrono::{TimeZone, Utc};
    use kasir_core::{
        CommitContext, CommitRequest, Customer, InventoryConfig, Money, Operator, PaymentInput,
        Product, RawMaterial, RecipeItem, StockLedger, StockTarget, TaxConfig, TerminalState,
    };
    use crate::DbError;

    fn latte() -> Product {
        Product {
            id: "latte".to_string(),
            name: "Latte".to_string(),
            price: Money::from_minor(25_000),
            cost_price: None,
            categories: vec!["coffee".to_string()],
            track_stock: false,
            stock: None,
            recipe: vec![RecipeItem::RawMaterial {
                raw_material_id: "milk".to_string(),
                quantity: 150,
            }],
            addons: vec![],
            variants: vec![],
            modifier_groups: vec![],
            tax_rate: None,
            barcode: None,
        }
    }

    fn milk() -> RawMaterial {
        RawMaterial {
            id: "milk".to_string(),
            name: "Susu".to_string(),
            stock: 1_000,
            unit: "ml".to_string(),
            cost_per_unit: Money::from_minor(20),
        }
    }

    fn member() -> Customer {
        Customer {
            id: "c1".to_string(),
            member_code: "M-001".to_string(),
            name: "Budi".to_string(),
            contact: None,
            points: 5,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog().upsert_product(&latte()).await.unwrap();
        db.catalog().upsert_raw_material(&milk()).await.unwrap();
        db.customers().upsert(&member()).await.unwrap();
        db
    }

    fn commit_one(state: &mut TerminalState) -> StateChange {
        let operator = Operator {
            id: "op-1".to_string(),
            name: "Sari".to_string(),
        };
        let inventory = InventoryConfig {
            enabled: true,
            track_ingredients: true,
            strict_stock: true,
        };
        let tax = TaxConfig::default();
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();

        state.add_product("latte", None, &inventory).unwrap();
        let receipt = state
            .commit(
                &CommitRequest {
                    payments: vec![PaymentInput::cash(Money::from_minor(25_000))],
                    customer_id: Some("c1".to_string()),
                    ..CommitRequest::default()
                },
                &CommitContext {
                    operator: Some(&operator),
                    tax: &tax,
                    inventory: &inventory,
                    loyalty_enabled: true,
                    terminal_code: "K1",
                    now,
                },
            )
            .unwrap();
        StateChange::Committed(receipt)
    }

    #[tokio::test]
    async fn test_replayed_commit_is_idempotent() {
        let db = seeded().await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let mut state = TerminalState::restore(db.load_snapshot(today).await.unwrap());

        let change = commit_one(&mut state);
        db.apply(&change).await.unwrap();
        db.apply(&change).await.unwrap();

        let materials = db.catalog().list_raw_materials().await.unwrap();
        assert_eq!(materials[0].stock, 850);
        assert_eq!(db.stock().list_adjustments().await.unwrap().len(), 1);
        assert_eq!(db.transactions().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let db = seeded().await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let mut state = TerminalState::restore(db.load_snapshot(today).await.unwrap());

        let change = commit_one(&mut state);
        db.apply(&change).await.unwrap();

        let reloaded = TerminalState::restore(db.load_snapshot(today).await.unwrap());
        assert_eq!(reloaded.transactions.len(), 1);
        assert_eq!(
            reloaded.customers.get("c1").map(|c| c.points),
            state.customers.get("c1").map(|c| c.points)
        );
        assert_eq!(
            reloaded.inventory().raw_material("milk").map(|m| m.stock),
            Some(850)
        );
        assert_eq!(reloaded.receipts.issued_today(), 1);
    }

    #[tokio::test]
    async fn test_held_cart_saved_then_deleted() {
        let db = seeded().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        let mut state = TerminalState::new();
        state.ledger = StockLedger::new(Inventory::new(vec![latte()], vec![milk()]), vec![]);

        state
            .add_product("latte", None, &InventoryConfig::default())
            .unwrap();
        for change in state.hold_cart("Meja 4", now).unwrap() {
            db.apply(&change).await.unwrap();
        }
        let held = db.held_carts().list().await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].name, "Meja 4");

        let change = state.delete_held_cart(&held[0].id, now).unwrap();
        db.apply(&change).await.unwrap();
        assert!(db.held_carts().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjustment_for_missing_target_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        let mut state = TerminalState::new();
        state.ledger = StockLedger::new(Inventory::new(vec![latte()], vec![milk()]), vec![]);

        let operator = Operator {
            id: "op-1".to_string(),
            name: "Sari".to_string(),
        };
        let change = state
            .adjust_stock(
                &StockTarget::RawMaterial("milk".to_string()),
                -50,
                "spilled",
                &operator,
                now,
            )
            .unwrap();

        let err = db.apply(&change).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(!err.is_transient());
        assert!(db.stock().list_adjustments().await.unwrap().is_empty());
    }
}
