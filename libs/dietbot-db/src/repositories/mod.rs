//! Storage seams used by the bot. The PostgreSQL repositories implement them;
//! tests substitute in-memory versions.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{GeneratedPlan, NewUserProfile, PaymentRecord, PaymentStatus, UserProfile};

pub mod payment_repo;
pub mod plan_repo;
pub mod user_repo;

pub use payment_repo::PaymentRepository;
pub use plan_repo::PlanRepository;
pub use user_repo::UserRepository;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert(&self, profile: &NewUserProfile) -> Result<UserProfile>;

    async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<UserProfile>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_pending(
        &self,
        user_id: i64,
        amount: i64,
        currency: &str,
        session_ref: &str,
    ) -> Result<PaymentRecord>;

    /// Marks every pending payment of the user as failed. Returns how many rows changed.
    async fn supersede_pending(&self, user_id: i64) -> Result<u64>;

    /// Returns `false` when no payment has this session reference.
    async fn update_status(&self, session_ref: &str, status: PaymentStatus) -> Result<bool>;

    async fn get_by_session_ref(&self, session_ref: &str) -> Result<Option<PaymentRecord>>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn create(&self, user_id: i64, payment_id: i64, plan_text: &str) -> Result<GeneratedPlan>;

    async fn get_by_payment_id(&self, payment_id: i64) -> Result<Option<GeneratedPlan>>;
}
