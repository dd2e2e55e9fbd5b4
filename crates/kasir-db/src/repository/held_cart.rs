//! # Held Cart Repository

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::{from_payload, to_payload};
use kasir_core::HeldCart;

#[derive(Debug, Clone)]
pub struct HeldCartRepository {
    pool: SqlitePool,
}

impl HeldCartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        HeldCartRepository { pool }
    }

    /// Writes the latest snapshot of a held cart.
    pub(crate) async fn upsert_in(conn: &mut SqliteConnection, held: &HeldCart) -> DbResult<()> {
        debug!(id = %held.id, name = %held.name, items = held.items.len(), "Saving held cart");

        sqlx::query(
            r#"
            INSERT INTO held_carts (id, name, payload, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&held.id)
        .bind(&held.name)
        .bind(to_payload(held)?)
        .bind(held.created_at)
        .bind(held.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Deleting a cart that is already gone is not an error.
    pub(crate) async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id, "Deleting held cart");

        sqlx::query("DELETE FROM held_carts WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Held carts, oldest first.
    pub async fn list(&self) -> DbResult<Vec<HeldCart>> {
        let rows = sqlx::query("SELECT payload FROM held_carts ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(from_payload).collect()
    }
}
