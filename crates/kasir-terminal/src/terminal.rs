//! # Terminal
//!
//! The session context of one till. Owns the in-memory state, the signed-in
//! operator and the persist writer.
//!
//! ## Thread Safety
//! The state sits behind a `Mutex` so that UI handlers running on different
//! threads still mutate it one at a time. Every mutation runs to completion
//! under the lock, and its state changes are queued before the lock is
//! released, so the writer sees them in the order they happened.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI action ──► Terminal::commit() ──► lock state                        │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                               TerminalState::commit()                   │
//! │                                   │            │                        │
//! │                                  Err          Ok(receipt)               │
//! │                                   │            │                        │
//! │                         nothing changed    writer.submit(Committed)     │
//! │                                                │                        │
//! │                                          unlock, return Transaction     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::TerminalConfig;
use crate::error::{TerminalError, TerminalResult};
use crate::persist::{PersistHealth, PersistSettings, PersistWriter};
use kasir_core::{
    CommitContext, CommitError, CommitRequest, HeldCart, LineSelection, Operator, PaymentInput,
    StateChange, StateSnapshot, StockCount, StockTarget, TerminalState, Totals, Transaction,
};
use kasir_db::{Database, DbConfig, StateStore};

pub struct Terminal {
    config: TerminalConfig,
    state: Mutex<TerminalState>,
    operator: Mutex<Option<Operator>>,
    writer: PersistWriter,
}

impl Terminal {
    /// Opens the configured database, loads the snapshot into memory and
    /// starts the writer.
    pub async fn open(config: TerminalConfig) -> TerminalResult<Self> {
        let path = config.database_path()?;
        info!(path = %path.display(), terminal = %config.terminal.id, "Opening terminal");

        let db = Database::new(DbConfig::new(path)).await?;
        Self::open_with(config, db).await
    }

    /// Like [`open`](Self::open) with an already connected database.
    pub async fn open_with(config: TerminalConfig, db: Database) -> TerminalResult<Self> {
        let snapshot = db.load_snapshot(Utc::now().date_naive()).await?;
        Ok(Self::with_store(config, snapshot, Arc::new(db)))
    }

    /// Builds a terminal over any store. Must run inside a tokio runtime.
    pub fn with_store(config: TerminalConfig, snapshot: StateSnapshot, store: Arc<dyn StateStore>) -> Self {
        let writer = PersistWriter::spawn(store, PersistSettings::from(&config.persist));
        Terminal {
            config,
            state: Mutex::new(TerminalState::restore(snapshot)),
            operator: Mutex::new(None),
            writer,
        }
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    // =========================================================================
    // Operator
    // =========================================================================

    pub fn sign_in(&self, operator: Operator) {
        info!(operator_id = %operator.id, name = %operator.name, "Operator signed in");
        *lock(&self.operator) = Some(operator);
    }

    pub fn sign_out(&self) {
        if let Some(operator) = lock(&self.operator).take() {
            info!(operator_id = %operator.id, "Operator signed out");
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        lock(&self.operator).clone()
    }

    fn require_operator(&self) -> TerminalResult<Operator> {
        self.operator().ok_or(TerminalError::Commit(CommitError::NoOperator))
    }

    // =========================================================================
    // State Access
    // =========================================================================

    /// Read access to the whole state.
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TerminalState) -> R,
    {
        f(&*lock(&self.state))
    }

    /// Direct cart edits (quantities, removals, metadata). When the working
    /// cart is a held cart, its snapshot is saved after `f` returns.
    pub fn with_cart_mut<F, R>(&self, f: F) -> TerminalResult<R>
    where
        F: FnOnce(&mut kasir_core::Cart) -> R,
    {
        let mut state = lock(&self.state);
        let result = f(&mut state.cart);
        let changes = state.save_active_cart(Utc::now());
        self.writer.submit_all(changes)?;
        Ok(result)
    }

    pub fn totals(&self) -> Totals {
        let tax = self.config.tax_config();
        self.with_state(|s| s.cart.totals(&tax))
    }

    pub fn transaction(&self, id: &str) -> Option<Transaction> {
        self.with_state(|s| s.transactions.get(id).cloned())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    pub fn add_product(&self, product_id: &str, selection: Option<&LineSelection>) -> TerminalResult<String> {
        let inventory = self.config.inventory_config();
        let line_id = lock(&self.state).add_product(product_id, selection, &inventory)?;
        debug!(product_id, line_id = %line_id, "Product added to cart");
        Ok(line_id)
    }

    pub fn apply_discount(&self, definition_id: &str, line_id: Option<&str>) -> TerminalResult<()> {
        lock(&self.state).apply_discount_definition(definition_id, line_id, Utc::now())?;
        debug!(definition_id, ?line_id, "Discount applied");
        Ok(())
    }

    pub fn apply_reward(&self, reward_id: &str, customer_id: &str) -> TerminalResult<()> {
        if !self.config.loyalty.enabled {
            return Err(TerminalError::LoyaltyDisabled);
        }
        lock(&self.state).apply_reward(reward_id, customer_id, Utc::now())?;
        info!(reward_id, customer_id, "Reward applied to cart");
        Ok(())
    }

    // =========================================================================
    // Held Carts
    // =========================================================================

    pub fn hold_cart(&self, name: &str) -> TerminalResult<()> {
        self.require_cart_holding()?;
        let mut state = lock(&self.state);
        let changes = state.hold_cart(name, Utc::now())?;
        info!(name, active = ?state.held.active_id(), "Cart held");
        self.writer.submit_all(changes)
    }

    /// Switches to a held cart, or to a fresh one for `None`.
    pub fn switch_cart(&self, target: Option<&str>) -> TerminalResult<()> {
        self.require_cart_holding()?;
        let mut state = lock(&self.state);
        let changes = state.switch_cart(target, Utc::now())?;
        info!(?target, flushed = changes.len(), "Switched cart");
        self.writer.submit_all(changes)
    }

    pub fn save_active_cart(&self) -> TerminalResult<()> {
        let mut state = lock(&self.state);
        let changes = state.save_active_cart(Utc::now());
        self.writer.submit_all(changes)
    }

    pub fn rename_held_cart(&self, id: &str, name: &str) -> TerminalResult<()> {
        self.require_cart_holding()?;
        let mut state = lock(&self.state);
        let change = state.rename_held_cart(id, name, Utc::now())?;
        self.writer.submit(change)
    }

    pub fn delete_held_cart(&self, id: &str) -> TerminalResult<()> {
        self.require_cart_holding()?;
        let mut state = lock(&self.state);
        let change = state.delete_held_cart(id, Utc::now())?;
        info!(held_cart_id = id, "Held cart deleted");
        self.writer.submit(change)
    }

    pub fn held_carts(&self) -> Vec<HeldCart> {
        self.with_state(|s| s.held.list().into_iter().cloned().collect())
    }

    fn require_cart_holding(&self) -> TerminalResult<()> {
        if self.config.session.enable_cart_holding {
            Ok(())
        } else {
            Err(TerminalError::CartHoldingDisabled)
        }
    }

    // =========================================================================
    // Commit & Settlement
    // =========================================================================

    /// Commits the working cart as the signed-in operator.
    pub fn commit(&self, request: &CommitRequest) -> TerminalResult<Transaction> {
        let operator = self.operator();
        let tax = self.config.tax_config();
        let inventory = self.config.inventory_config();
        let ctx = CommitContext {
            operator: operator.as_ref(),
            tax: &tax,
            inventory: &inventory,
            loyalty_enabled: self.config.loyalty.enabled,
            terminal_code: self.config.terminal_code(),
            now: Utc::now(),
        };

        let mut state = lock(&self.state);
        let receipt = state.commit(request, &ctx)?;
        let transaction = receipt.transaction.clone();

        info!(
            transaction_id = %transaction.id,
            receipt_number = %transaction.receipt_number,
            total = %transaction.total,
            status = transaction.payment_status.as_str(),
            lines = transaction.items.len(),
            "Transaction committed"
        );
        if transaction.oversold {
            warn!(transaction_id = %transaction.id, "Sale drove tracked stock negative");
        }

        self.writer.submit(StateChange::Committed(receipt))?;
        Ok(transaction)
    }

    pub fn add_payment(&self, transaction_id: &str, payments: &[PaymentInput]) -> TerminalResult<Transaction> {
        let mut state = lock(&self.state);
        let transaction = state.add_payment(transaction_id, payments, Utc::now())?;

        info!(
            transaction_id,
            paid = %transaction.amount_paid,
            due = %transaction.balance_due(),
            status = transaction.payment_status.as_str(),
            "Payment added"
        );

        self.writer.submit(StateChange::PaymentAdded(transaction.clone()))?;
        Ok(transaction)
    }

    pub fn refund(&self, transaction_id: &str) -> TerminalResult<Transaction> {
        let operator = self.require_operator()?;

        let mut state = lock(&self.state);
        let receipt = state.refund(transaction_id, &operator, Utc::now())?;
        let transaction = receipt.transaction.clone();

        info!(
            transaction_id,
            restored = receipt.adjustments.len(),
            operator_id = %operator.id,
            "Transaction refunded"
        );

        self.writer.submit(StateChange::Refunded(receipt))?;
        Ok(transaction)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    pub fn adjust_stock(&self, target: &StockTarget, delta: i64, reason: &str) -> TerminalResult<()> {
        let operator = self.require_operator()?;
        let mut state = lock(&self.state);
        let change = state.adjust_stock(target, delta, reason, &operator, Utc::now())?;
        info!(target_id = target.id(), delta, reason, "Stock adjusted");
        self.writer.submit(change)
    }

    /// Stock opname. Returns the number of adjustments recorded.
    pub fn reconcile_stock(&self, counts: &[StockCount]) -> TerminalResult<usize> {
        let operator = self.require_operator()?;
        let mut state = lock(&self.state);
        let Some(change) = state.reconcile_stock(counts, &operator, Utc::now())? else {
            info!(counted = counts.len(), "Stock count matched, nothing to adjust");
            return Ok(0);
        };

        let adjusted = match &change {
            StateChange::StockAdjusted(adjustments) => adjustments.len(),
            _ => 0,
        };
        info!(counted = counts.len(), adjusted, "Stock reconciled");
        self.writer.submit(change)?;
        Ok(adjusted)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn persist_health(&self) -> PersistHealth {
        self.writer.health()
    }

    pub fn retry_failed(&self) -> TerminalResult<()> {
        self.writer.retry_failed()
    }

    /// Waits for every queued change to reach the store.
    pub async fn flush(&self) -> TerminalResult<()> {
        self.writer.flush().await
    }

    /// Flushes what it can and stops the writer.
    pub async fn close(&self) -> TerminalResult<()> {
        let flushed = self.writer.flush().await;
        self.writer.shutdown().await?;
        info!(terminal = %self.config.terminal.id, "Terminal closed");
        flushed
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
