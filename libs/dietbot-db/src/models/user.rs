use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub tg_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub gender: String,
    pub height_cm: i32,
    pub weight_kg: i32,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Confirmed answers, written with insert-or-update keyed by `tg_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserProfile {
    pub tg_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub gender: String,
    pub height_cm: i32,
    pub weight_kg: i32,
    pub goal: String,
}
