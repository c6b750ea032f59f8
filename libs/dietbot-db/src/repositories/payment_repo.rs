use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::PaymentStore;
use crate::models::{PaymentRecord, PaymentStatus};

const PAYMENT_COLUMNS: &str =
    "id, user_id, amount, currency, session_ref, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn create_pending(
        &self,
        user_id: i64,
        amount: i64,
        currency: &str,
        session_ref: &str,
    ) -> Result<PaymentRecord> {
        let sql = format!(
            "INSERT INTO payments (user_id, amount, currency, session_ref, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(user_id)
            .bind(amount)
            .bind(currency)
            .bind(session_ref)
            .bind(PaymentStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert pending payment")
    }

    async fn supersede_pending(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE user_id = $1 AND status = $3",
        )
        .bind(user_id)
        .bind(PaymentStatus::Failed.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to supersede pending payments")?;
        Ok(result.rows_affected())
    }

    async fn update_status(&self, session_ref: &str, status: PaymentStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE session_ref = $1",
        )
        .bind(session_ref)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update payment status")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_by_session_ref(&self, session_ref: &str) -> Result<Option<PaymentRecord>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE session_ref = $1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(session_ref)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch payment by session reference")
    }
}
