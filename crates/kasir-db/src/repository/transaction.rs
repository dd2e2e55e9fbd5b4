//! # Transaction Repository
//!
//! Committed sales and their payments.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Committed      insert_in()   INSERT ... ON CONFLICT(id) DO NOTHING     │
//! │  PaymentAdded   update_in()   overwrite status / paid / payload         │
//! │  Refunded       update_in()                                             │
//! │                                                                         │
//! │  Both paths insert payments with ON CONFLICT(id) DO NOTHING, so a       │
//! │  replayed change adds no duplicate rows.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::{from_payload, to_payload};
use kasir_core::receipt::parse_sequence;
use kasir_core::{PaymentStatus, Transaction};

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Inserts a freshly committed transaction. A second insert of the same
    /// id is ignored.
    pub(crate) async fn insert_in(conn: &mut SqliteConnection, tx: &Transaction) -> DbResult<()> {
        debug!(id = %tx.id, receipt_number = %tx.receipt_number, "Inserting transaction");

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, receipt_number, payment_status, total, amount_paid,
                customer_id, operator_id, payload, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.receipt_number)
        .bind(tx.payment_status)
        .bind(tx.total.minor())
        .bind(tx.amount_paid.minor())
        .bind(&tx.customer_id)
        .bind(&tx.operator.id)
        .bind(to_payload(tx)?)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&mut *conn)
        .await?;

        Self::insert_payments_in(conn, tx).await
    }

    /// Writes the current payment state of an existing transaction.
    pub(crate) async fn update_in(conn: &mut SqliteConnection, tx: &Transaction) -> DbResult<()> {
        debug!(id = %tx.id, status = tx.payment_status.as_str(), "Updating transaction");

        sqlx::query(
            r#"
            UPDATE transactions SET
                payment_status = ?2,
                amount_paid = ?3,
                payload = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&tx.id)
        .bind(tx.payment_status)
        .bind(tx.amount_paid.minor())
        .bind(to_payload(tx)?)
        .bind(tx.updated_at)
        .execute(&mut *conn)
        .await?;

        Self::insert_payments_in(conn, tx).await
    }

    async fn insert_payments_in(conn: &mut SqliteConnection, tx: &Transaction) -> DbResult<()> {
        for payment in &tx.payments {
            sqlx::query(
                r#"
                INSERT INTO payments (id, transaction_id, method, amount, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&payment.id)
            .bind(&tx.id)
            .bind(payment.method)
            .bind(payment.amount.minor())
            .bind(payment.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Transaction>> {
        let row = sqlx::query("SELECT payload FROM transactions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(from_payload).transpose()
    }

    /// All transactions, oldest first.
    pub async fn list(&self) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query("SELECT payload FROM transactions ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(from_payload).collect()
    }

    /// Transactions in one payment state, e.g. open debts.
    pub async fn list_by_status(&self, status: PaymentStatus) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT payload FROM transactions WHERE payment_status = ?1 ORDER BY created_at, rowid",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(from_payload).collect()
    }

    /// Sum of recorded payment rows for a transaction.
    pub async fn total_paid(&self, transaction_id: &str) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount) FROM payments WHERE transaction_id = ?1")
                .bind(transaction_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(total.unwrap_or(0))
    }

    /// Highest receipt sequence issued on `day`, 0 if none.
    pub async fn last_receipt_sequence(&self, day: NaiveDate) -> DbResult<u32> {
        let prefix = format!("{}-%", day.format("%Y%m%d"));
        let numbers: Vec<String> =
            sqlx::query_scalar("SELECT receipt_number FROM transactions WHERE receipt_number LIKE ?1")
                .bind(prefix)
                .fetch_all(&self.pool)
                .await?;

        Ok(numbers
            .iter()
            .filter_map(|n| parse_sequence(n, day))
            .max()
            .unwrap_or(0))
    }
}
