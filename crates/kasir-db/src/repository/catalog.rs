//! # Catalog Repository
//!
//! Products and raw materials. The catalog itself is edited outside the
//! terminal; this repository stores what it is given and loads it at
//! start-up. Stock columns are written only through [`super::stock`].

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::{from_payload, to_payload};
use kasir_core::{Product, RawMaterial};

/// Repository for catalog records.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts or replaces a product, including its stock level.
    pub async fn upsert_product(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Upserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, barcode, track_stock, stock, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                barcode = excluded.barcode,
                track_stock = excluded.track_stock,
                stock = excluded.stock,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(product.track_stock)
        .bind(product.stock)
        .bind(to_payload(product)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All products, with stock taken from the stock column.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let rows = sqlx::query("SELECT payload, stock FROM products ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> DbResult<Product> {
                let mut product: Product = from_payload(row)?;
                product.stock = row.try_get("stock")?;
                Ok(product)
            })
            .collect()
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query("SELECT payload, stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> DbResult<Product> {
            let mut product: Product = from_payload(&row)?;
            product.stock = row.try_get("stock")?;
            Ok(product)
        })
        .transpose()
    }

    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE barcode = ?1")
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => self.get_product(&id).await,
            None => Ok(None),
        }
    }

    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn upsert_raw_material(&self, material: &RawMaterial) -> DbResult<()> {
        debug!(id = %material.id, name = %material.name, "Upserting raw material");

        sqlx::query(
            r#"
            INSERT INTO raw_materials (id, name, stock, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                stock = excluded.stock,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&material.id)
        .bind(&material.name)
        .bind(material.stock)
        .bind(to_payload(material)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_raw_materials(&self) -> DbResult<Vec<RawMaterial>> {
        let rows = sqlx::query("SELECT payload, stock FROM raw_materials ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> DbResult<RawMaterial> {
                let mut material: RawMaterial = from_payload(row)?;
                material.stock = row.try_get("stock")?;
                Ok(material)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use kasir_core::Money;

    fn product(id: &str, stock: Option<i64>) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price: Money::from_minor(10_000),
            cost_price: None,
            categories: vec!["Minuman".to_string()],
            track_stock: stock.is_some(),
            stock,
            recipe: vec![],
            addons: vec![],
            variants: vec![],
            modifier_groups: vec![],
            tax_rate: None,
            barcode: Some(format!("899{id}")),
        }
    }

    #[tokio::test]
    async fn test_product_round_trip_and_barcode() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        repo.upsert_product(&product("p1", Some(5))).await.unwrap();
        repo.upsert_product(&product("p2", None)).await.unwrap();
        assert_eq!(repo.count_products().await.unwrap(), 2);

        let found = repo.find_by_barcode("899p1").await.unwrap().unwrap();
        assert_eq!(found.stock, Some(5));
        assert_eq!(found.categories, vec!["Minuman".to_string()]);
        assert!(repo.find_by_barcode("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stock_column_wins_over_payload() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();
        repo.upsert_product(&product("p1", Some(5))).await.unwrap();

        sqlx::query("UPDATE products SET stock = 2 WHERE id = 'p1'")
            .execute(db.pool())
            .await
            .unwrap();

        let products = repo.list_products().await.unwrap();
        assert_eq!(products[0].stock, Some(2));
    }
}
