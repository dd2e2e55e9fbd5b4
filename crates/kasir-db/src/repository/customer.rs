//! # Customer Repository
//!
//! Loyalty members. The point balance is a plain column written with the
//! absolute value held in memory.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::Customer;

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

const SELECT_CUSTOMER: &str =
    "SELECT id, member_code, name, contact, points, created_at FROM customers";

fn map_customer(row: &SqliteRow) -> DbResult<Customer> {
    Ok(Customer {
        id: row.try_get("id")?,
        member_code: row.try_get("member_code")?,
        name: row.try_get("name")?,
        contact: row.try_get("contact")?,
        points: row.try_get("points")?,
        created_at: row.try_get("created_at")?,
    })
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn upsert(&self, customer: &Customer) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::upsert_in(&mut conn, customer).await
    }

    /// Inserts the customer or overwrites name, contact and balance.
    pub(crate) async fn upsert_in(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, points = customer.points, "Writing customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, member_code, name, contact, points, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                member_code = excluded.member_code,
                name = excluded.name,
                contact = excluded.contact,
                points = excluded.points
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.member_code)
        .bind(&customer.name)
        .bind(&customer.contact)
        .bind(customer.points)
        .bind(customer.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Customer>> {
        let row = sqlx::query(&format!("{SELECT_CUSTOMER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_customer).transpose()
    }

    pub async fn find_by_member_code(&self, member_code: &str) -> DbResult<Option<Customer>> {
        let row = sqlx::query(&format!("{SELECT_CUSTOMER} WHERE member_code = ?1"))
            .bind(member_code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_customer).transpose()
    }

    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let rows = sqlx::query(&format!("{SELECT_CUSTOMER} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_customer).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::{Database, DbConfig};
    use chrono::Utc;

    fn customer(id: &str, code: &str, points: i64) -> Customer {
        Customer {
            id: id.to_string(),
            member_code: code.to_string(),
            name: "Siti".to_string(),
            contact: Some("0812".to_string()),
            points,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_balance() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        repo.upsert(&customer("c1", "M-001", 10)).await.unwrap();
        repo.upsert(&customer("c1", "M-001", 25)).await.unwrap();

        let loaded = repo.find_by_member_code("M-001").await.unwrap().unwrap();
        assert_eq!(loaded.points, 25);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_member_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        repo.upsert(&customer("c1", "M-001", 0)).await.unwrap();
        let err = repo.upsert(&customer("c2", "M-001", 0)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
