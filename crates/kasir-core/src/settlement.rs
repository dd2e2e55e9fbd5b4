//! # Settlement
//!
//! Operations on transactions after checkout: installment payments for
//! credit sales and refunds.
//!
//! ```text
//! unpaid ──add_payment──► partial ──add_payment──► paid
//!    │                       │                      │
//!    └───────────────────────┴──────refund──────────┴──► refunded (final)
//! ```

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::loyalty::{apply_points_delta, refund_points_delta};
use crate::money::Money;
use crate::state::{RefundReceipt, TerminalState};
use crate::types::{
    AdjustmentKind, Operator, Payment, PaymentInput, PaymentStatus, Transaction,
};
use crate::validation::validate_payment_amount;

/// Reason text on refund adjustments.
pub const REFUND_REASON: &str = "refund";

impl TerminalState {
    /// Appends installment payments and recomputes the payment status.
    /// Items, totals and stock are never touched.
    pub fn add_payment(
        &mut self,
        transaction_id: &str,
        payments: &[PaymentInput],
        now: DateTime<Utc>,
    ) -> CoreResult<Transaction> {
        if payments.is_empty() {
            return Err(ValidationError::Required {
                field: "payments".to_string(),
            }
            .into());
        }
        for payment in payments {
            validate_payment_amount(payment.amount)?;
        }

        let tx = self
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        if tx.payment_status == PaymentStatus::Refunded {
            return Err(CoreError::AlreadyRefunded(transaction_id.to_string()));
        }

        tx.payments.extend(payments.iter().map(|p| Payment {
            id: Uuid::new_v4().to_string(),
            method: p.method,
            amount: p.amount,
            created_at: now,
        }));
        tx.amount_paid = tx.payments.iter().map(|p| p.amount).sum::<Money>();
        tx.payment_status = PaymentStatus::from_amounts(tx.amount_paid, tx.total);
        tx.updated_at = now;
        Ok(tx.clone())
    }

    /// Reverses a sale: restores depleted stock, reverts loyalty points and
    /// marks the transaction refunded. Allowed once per transaction.
    ///
    /// Restores exactly what the sale's adjustments removed, whatever the
    /// catalog or inventory settings look like now.
    pub fn refund(
        &mut self,
        transaction_id: &str,
        actor: &Operator,
        now: DateTime<Utc>,
    ) -> CoreResult<RefundReceipt> {
        let tx = self
            .transactions
            .get(transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        if tx.payment_status == PaymentStatus::Refunded {
            return Err(CoreError::AlreadyRefunded(transaction_id.to_string()));
        }

        let plan = self.ledger.plan_restoration(transaction_id);
        let points_delta = refund_points_delta(tx);
        let customer_id = tx.customer_id.clone();

        let adjustments = self.ledger.apply_plan(
            &plan,
            AdjustmentKind::Refund,
            REFUND_REASON,
            actor,
            Some(transaction_id),
            now,
        );

        let customer = customer_id.and_then(|id| match self.customers.get_mut(&id) {
            Some(customer) => {
                apply_points_delta(customer, points_delta);
                Some(customer.clone())
            }
            None => {
                warn!(customer_id = %id, transaction_id, "refunded customer no longer exists, points not reverted");
                None
            }
        });

        let tx = self
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        tx.payment_status = PaymentStatus::Refunded;
        tx.updated_at = now;

        Ok(RefundReceipt {
            transaction: tx.clone(),
            adjustments,
            customer,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
