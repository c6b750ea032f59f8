use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedPlan {
    pub id: i64,
    pub user_id: i64,
    pub payment_id: i64,
    pub plan_text: String,
    pub created_at: DateTime<Utc>,
}
