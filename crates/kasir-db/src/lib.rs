//! # kasir-db: Local Collection Store for Kasir
//!
//! SQLite persistence for one terminal. The terminal keeps its state in
//! memory; this crate loads that state at start-up and writes every
//! [`StateChange`](kasir_core::StateChange) the terminal emits.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir Data Flow                                  │
//! │                                                                         │
//! │  kasir-terminal (PersistWriter)                                         │
//! │       │ StateChange                          ▲ StateSnapshot            │
//! │       ▼                                      │                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kasir-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │  StateStore   │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │  (store.rs)   │───►│ catalog.rs    │    │  (embedded)  │   │   │
//! │  │   │               │    │ customer.rs   │    │              │   │   │
//! │  │   │ apply()       │    │ stock.rs      │    │ 001_initial  │   │   │
//! │  │   │ load_snapshot │    │ transaction.rs│    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per collection
//! - [`store`] - The [`StateStore`] boundary and snapshot loading
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasir_db::{Database, DbConfig, StateStore};
//!
//! let db = Database::new(DbConfig::new("kasir.db")).await?;
//! let snapshot = db.load_snapshot(Utc::now().date_naive()).await?;
//! let mut state = TerminalState::restore(snapshot);
//!
//! for change in state.hold_cart("Meja 4", Utc::now())? {
//!     db.apply(&change).await?;
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::StateStore;

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::customer::CustomerRepository;
pub use repository::held_cart::HeldCartRepository;
pub use repository::loyalty::LoyaltyRepository;
pub use repository::stock::StockRepository;
pub use repository::transaction::TransactionRepository;
