use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::UserStore;
use crate::models::{NewUserProfile, UserProfile};

const USER_COLUMNS: &str =
    "id, tg_id, chat_id, username, gender, height_cm, weight_kg, goal, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn upsert(&self, profile: &NewUserProfile) -> Result<UserProfile> {
        let sql = format!(
            r#"
            INSERT INTO users (tg_id, chat_id, username, gender, height_cm, weight_kg, goal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tg_id) DO UPDATE
            SET chat_id = EXCLUDED.chat_id,
                username = EXCLUDED.username,
                gender = EXCLUDED.gender,
                height_cm = EXCLUDED.height_cm,
                weight_kg = EXCLUDED.weight_kg,
                goal = EXCLUDED.goal,
                updated_at = NOW()
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(profile.tg_id)
            .bind(profile.chat_id)
            .bind(profile.username.as_deref())
            .bind(&profile.gender)
            .bind(profile.height_cm)
            .bind(profile.weight_kg)
            .bind(&profile.goal)
            .fetch_one(&self.pool)
            .await
            .context("Failed to upsert user profile")?;

        tracing::debug!("Upserted profile {} for tg_id {}", user.id, user.tg_id);
        Ok(user)
    }

    async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM users WHERE tg_id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(tg_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by TG ID")
    }
}
