//! # Repository Module
//!
//! One repository per collection.
//!
//! ## Two Kinds of Method
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.customers().list()              pool-backed, own connection         │
//! │  db.customers().upsert(&c)          (start-up, seeding, admin edits)    │
//! │                                                                         │
//! │  CustomerRepository::upsert_in(     borrows a connection, so several    │
//! │      &mut tx, &c)                   repositories share one SQL          │
//! │                                     transaction (see store.rs)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records are stored as JSON documents in a `payload` column, next to the
//! columns that are indexed or written on their own.
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Products and raw materials
//! - [`customer::CustomerRepository`] - Loyalty members and balances
//! - [`held_cart::HeldCartRepository`] - Suspended order tabs
//! - [`loyalty::LoyaltyRepository`] - Point rules, rewards, discount definitions
//! - [`stock::StockRepository`] - Stock levels and the adjustment trail
//! - [`transaction::TransactionRepository`] - Transactions and payments

pub mod catalog;
pub mod customer;
pub mod held_cart;
pub mod loyalty;
pub mod stock;
pub mod transaction;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::DbResult;

/// Encodes a record for the `payload` column.
pub(crate) fn to_payload<T: Serialize>(value: &T) -> DbResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes the `payload` column of a row.
pub(crate) fn from_payload<T: DeserializeOwned>(row: &SqliteRow) -> DbResult<T> {
    let payload: String = row.try_get("payload")?;
    Ok(serde_json::from_str(&payload)?)
}
