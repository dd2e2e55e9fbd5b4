//! # Loyalty Configuration Repository
//!
//! Point rules, rewards and discount definitions. Edited by settings
//! screens, read by the terminal at start-up.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::{from_payload, to_payload};
use kasir_core::{DiscountDefinition, PointRule, Reward};

#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    pub async fn upsert_point_rule(&self, rule: &PointRule) -> DbResult<()> {
        debug!(id = %rule.id, "Upserting point rule");

        sqlx::query(
            "INSERT INTO point_rules (id, payload) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
        )
        .bind(&rule.id)
        .bind(to_payload(rule)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_point_rules(&self) -> DbResult<Vec<PointRule>> {
        let rows = sqlx::query("SELECT payload FROM point_rules ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(from_payload).collect()
    }

    pub async fn upsert_reward(&self, reward: &Reward) -> DbResult<()> {
        debug!(id = %reward.id, cost = reward.points_cost, "Upserting reward");

        sqlx::query(
            r#"
            INSERT INTO rewards (id, name, points_cost, payload) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                points_cost = excluded.points_cost,
                payload = excluded.payload
            "#,
        )
        .bind(&reward.id)
        .bind(&reward.name)
        .bind(reward.points_cost)
        .bind(to_payload(reward)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Rewards, cheapest first.
    pub async fn list_rewards(&self) -> DbResult<Vec<Reward>> {
        let rows = sqlx::query("SELECT payload FROM rewards ORDER BY points_cost, name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(from_payload).collect()
    }

    pub async fn upsert_discount_definition(&self, def: &DiscountDefinition) -> DbResult<()> {
        debug!(id = %def.id, name = %def.name, "Upserting discount definition");

        sqlx::query(
            r#"
            INSERT INTO discount_definitions (id, name, is_active, payload) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_active = excluded.is_active,
                payload = excluded.payload
            "#,
        )
        .bind(&def.id)
        .bind(&def.name)
        .bind(def.is_active)
        .bind(to_payload(def)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_discount_definitions(&self) -> DbResult<Vec<DiscountDefinition>> {
        let rows = sqlx::query("SELECT payload FROM discount_definitions ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(from_payload).collect()
    }
}
