use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::PlanStore;
use crate::models::GeneratedPlan;

#[derive(Debug, Clone)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PlanRepository {
    async fn create(&self, user_id: i64, payment_id: i64, plan_text: &str) -> Result<GeneratedPlan> {
        // The join keeps plans tied to completed payments only.
        sqlx::query_as::<_, GeneratedPlan>(
            r#"
            INSERT INTO diet_plans (user_id, payment_id, plan_text)
            SELECT $1, p.id, $3
            FROM payments p
            WHERE p.id = $2 AND p.status = 'completed'
            RETURNING id, user_id, payment_id, plan_text, created_at
            "#,
        )
        .bind(user_id)
        .bind(payment_id)
        .bind(plan_text)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert diet plan")?
        .ok_or_else(|| anyhow::anyhow!("Payment {} is not completed", payment_id))
    }

    async fn get_by_payment_id(&self, payment_id: i64) -> Result<Option<GeneratedPlan>> {
        sqlx::query_as::<_, GeneratedPlan>(
            "SELECT id, user_id, payment_id, plan_text, created_at FROM diet_plans WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch diet plan by payment")
    }
}
