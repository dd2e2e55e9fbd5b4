//! # Stock Repository
//!
//! Stock levels and the append-only adjustment trail.
//!
//! ```text
//! record_in(adjustment)
//!     ├── INSERT stock_adjustments ... ON CONFLICT(id) DO NOTHING
//!     └── UPDATE <target table> SET stock = resulting_stock
//!
//! Replaying the same adjustment inserts nothing and writes the same
//! absolute stock again, so a retried change never double-decrements.
//! A target with no row fails with NotFound and the caller's transaction
//! rolls the adjustment back.
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{from_payload, to_payload};
use kasir_core::{StockAdjustment, StockTarget};

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Appends an adjustment and writes the target's resulting stock.
    pub(crate) async fn record_in(conn: &mut SqliteConnection, adjustment: &StockAdjustment) -> DbResult<()> {
        debug!(
            target_id = adjustment.target.id(),
            delta = adjustment.delta,
            resulting = adjustment.resulting_stock,
            "Recording stock adjustment"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (
                id, target_kind, target_id, delta, resulting_stock,
                kind, reason, actor_id, reference_id, payload, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&adjustment.id)
        .bind(adjustment.target.kind_str())
        .bind(adjustment.target.id())
        .bind(adjustment.delta)
        .bind(adjustment.resulting_stock)
        .bind(adjustment.kind)
        .bind(&adjustment.reason)
        .bind(&adjustment.actor.id)
        .bind(&adjustment.reference_id)
        .bind(to_payload(adjustment)?)
        .bind(adjustment.created_at)
        .execute(&mut *conn)
        .await?;

        Self::write_level_in(conn, &adjustment.target, adjustment.resulting_stock).await
    }

    async fn write_level_in(conn: &mut SqliteConnection, target: &StockTarget, stock: i64) -> DbResult<()> {
        let sql = match target {
            StockTarget::Product(_) => "UPDATE products SET stock = ?1 WHERE id = ?2",
            StockTarget::RawMaterial(_) => "UPDATE raw_materials SET stock = ?1 WHERE id = ?2",
        };
        let result = sqlx::query(sql)
            .bind(stock)
            .bind(target.id())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            warn!(
                kind = target.kind_str(),
                target_id = target.id(),
                "stock target missing from database, rejecting adjustment"
            );
            return Err(DbError::not_found(target.kind_str(), target.id()));
        }
        Ok(())
    }

    /// Whole audit trail, oldest first.
    pub async fn list_adjustments(&self) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query("SELECT payload FROM stock_adjustments ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(from_payload).collect()
    }

    /// Adjustments of one product or raw material, oldest first.
    pub async fn adjustments_for(&self, target: &StockTarget) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query(
            "SELECT payload FROM stock_adjustments
             WHERE target_kind = ?1 AND target_id = ?2
             ORDER BY created_at, rowid",
        )
        .bind(target.kind_str())
        .bind(target.id())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(from_payload).collect()
    }

    /// Adjustments made by one sale or refund.
    pub async fn adjustments_for_reference(&self, reference_id: &str) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query(
            "SELECT payload FROM stock_adjustments WHERE reference_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(from_payload).collect()
    }
}
