//! # kasir-core: Pure Business Logic for Kasir
//!
//! Pricing, availability, loyalty, cart and held-cart state, the stock
//! ledger and the transaction commit. Zero I/O: every operation is
//! synchronous and deterministic apart from ids and timestamps.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kasir Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layer (TypeScript, ts-rs bindings)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            kasir-terminal (session, persist writer)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   pricing   availability   loyalty   cart   held   ledger       │   │
//! │  │                       │                                         │   │
//! │  │                       ▼                                         │   │
//! │  │         state ──► commit / settlement ──► StateChange           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kasir-db (SQLite collection store)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer money and basis-point rates
//! - [`types`] - Data model (Product, CartItem, Transaction, ...)
//! - [`pricing`] - Totals, discounts, tax and service charge
//! - [`availability`] - Can this product be sold right now?
//! - [`loyalty`] - Point accrual and reward redemption
//! - [`cart`] - The working order
//! - [`held`] - Suspended order tabs
//! - [`ledger`] - Stock depletion, adjustments and opname
//! - [`state`] - Everything one terminal holds, plus [`StateChange`]
//! - [`commit`] - Checkout
//! - [`settlement`] - Installments and refunds
//!
//! ## Example Usage
//!
//! ```rust
//! use kasir_core::money::{Money, Rate};
//! use kasir_core::pricing::compute_totals;
//! use kasir_core::types::TaxConfig;
//!
//! let config = TaxConfig {
//!     tax_rate: Rate::from_percent(10),
//!     service_charge_rate: Rate::from_percent(5),
//! };
//! let totals = compute_totals(&[], None, &config);
//! assert_eq!(totals.final_total, Money::zero());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod cart;
pub mod commit;
pub mod error;
pub mod held;
pub mod inventory;
pub mod ledger;
pub mod loyalty;
pub mod money;
pub mod pricing;
pub mod receipt;
pub mod settlement;
pub mod state;
pub mod types;
pub mod validation;

#[cfg(test)]
mod fixtures;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, LineSelection};
pub use commit::{CommitContext, CommitRequest};
pub use error::{CommitError, CoreError, LoyaltyError, StockShortfall, ValidationError};
pub use held::HeldCartRegistry;
pub use inventory::Inventory;
pub use ledger::{StockCount, StockLedger};
pub use money::{Money, Rate};
pub use pricing::Totals;
pub use state::{CommitReceipt, RefundReceipt, StateChange, StateSnapshot, TerminalState};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// ## Business Reason
/// Catches typos at the till (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
