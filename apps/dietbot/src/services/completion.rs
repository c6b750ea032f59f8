//! Finalises a confirmed payment: marks it completed, generates the plan,
//! stores and delivers it. Safe to trigger more than once for the same
//! checkout session; later calls see the completed record and stop.

use dietbot_db::models::PaymentStatus;
use dietbot_db::repositories::{PaymentStore, PlanStore, UserStore};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::conversation::{ConversationState, ConversationStore, Stage};
use crate::services::notifier::{split_message, Notifier, TELEGRAM_MAX_MESSAGE_LEN};
use crate::services::plan_generator::PlanGenerator;

pub const GENERATION_FAILED: &str = "Sorry, we could not prepare your diet plan right now. \
    Your payment has been received; please contact support and we will send the plan manually.";
pub const PLAN_HEADER: &str = "🥗 Your personalized diet plan is ready!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Delivered,
    AlreadyCompleted,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no payment with session reference {0}")]
    UnknownPayment(String),
    #[error("no profile for user {0}")]
    UnknownUser(i64),
    #[error("payment {session_ref} does not belong to user {user_id}")]
    ForeignPayment { user_id: i64, session_ref: String },
    #[error("payment {0} is not completed after the status update")]
    NotCompleted(String),
    #[error("plan generation failed: {0}")]
    Generation(String),
    #[error("plan generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("plan delivery failed: {0:#}")]
    Delivery(anyhow::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct PaymentCompletionHandler {
    users: Arc<dyn UserStore>,
    payments: Arc<dyn PaymentStore>,
    plans: Arc<dyn PlanStore>,
    conversations: Arc<dyn ConversationStore>,
    generator: Arc<dyn PlanGenerator>,
    notifier: Arc<dyn Notifier>,
    plan_timeout: Duration,
}

impl PaymentCompletionHandler {
    pub fn new(
        users: Arc<dyn UserStore>,
        payments: Arc<dyn PaymentStore>,
        plans: Arc<dyn PlanStore>,
        conversations: Arc<dyn ConversationStore>,
        generator: Arc<dyn PlanGenerator>,
        notifier: Arc<dyn Notifier>,
        plan_timeout: Duration,
    ) -> Self {
        Self {
            users,
            payments,
            plans,
            conversations,
            generator,
            notifier,
            plan_timeout,
        }
    }

    pub async fn on_payment_confirmed(
        &self,
        user_id: i64,
        session_ref: &str,
    ) -> Result<CompletionOutcome, CompletionError> {
        let _lock = self.conversations.lock_user(user_id).await;

        let payment = self
            .payments
            .get_by_session_ref(session_ref)
            .await?
            .ok_or_else(|| CompletionError::UnknownPayment(session_ref.to_string()))?;

        if payment.status == PaymentStatus::Completed
            || self.plans.get_by_payment_id(payment.id).await?.is_some()
        {
            info!(
                "Payment {} for user {} already completed, skipping",
                session_ref, user_id
            );
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        let profile = self
            .users
            .get_by_tg_id(user_id)
            .await?
            .ok_or(CompletionError::UnknownUser(user_id))?;

        if payment.user_id != profile.id {
            return Err(CompletionError::ForeignPayment {
                user_id,
                session_ref: session_ref.to_string(),
            });
        }

        if !self
            .payments
            .update_status(session_ref, PaymentStatus::Completed)
            .await?
        {
            return Err(CompletionError::UnknownPayment(session_ref.to_string()));
        }

        let payment = self
            .payments
            .get_by_session_ref(session_ref)
            .await?
            .filter(|p| p.status == PaymentStatus::Completed)
            .ok_or_else(|| CompletionError::NotCompleted(session_ref.to_string()))?;

        info!("Payment {} completed for user {}", session_ref, user_id);
        self.set_stage(user_id, Stage::Processing).await;

        let generated =
            tokio::time::timeout(self.plan_timeout, self.generator.generate(&profile)).await;
        let plan = match generated {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                self.apologise(profile.chat_id, user_id).await;
                return Err(CompletionError::Generation(format!("{:#}", e)));
            }
            Err(_) => {
                self.apologise(profile.chat_id, user_id).await;
                return Err(CompletionError::Timeout(self.plan_timeout));
            }
        };

        if let Err(e) = self.plans.create(profile.id, payment.id, &plan).await {
            error!(
                "Failed to store plan for payment {} (user {}): {:#}",
                session_ref, user_id, e
            );
        }

        let mut delivery_error = None;
        let chunks = split_message(&plan, TELEGRAM_MAX_MESSAGE_LEN);
        for text in std::iter::once(PLAN_HEADER.to_string()).chain(chunks) {
            if let Err(e) = self.notifier.send_text(profile.chat_id, &text).await {
                error!("Failed to send plan part to user {}: {:#}", user_id, e);
                delivery_error.get_or_insert(e);
            }
        }

        // Delivery errors still leave the conversation Complete.
        self.set_stage(user_id, Stage::Complete).await;
        if let Some(e) = delivery_error {
            return Err(CompletionError::Delivery(e));
        }
        info!("Diet plan delivered to user {}", user_id);
        Ok(CompletionOutcome::Delivered)
    }

    async fn set_stage(&self, user_id: i64, stage: Stage) {
        let name = stage.name();
        let found = self
            .conversations
            .mutate(
                user_id,
                Box::new(move |state: &mut ConversationState| state.stage = stage),
            )
            .await;
        if !found {
            warn!("No conversation for user {} while moving to {}", user_id, name);
        }
    }

    /// The payment stays completed without a plan; operators resolve it by hand.
    async fn apologise(&self, chat_id: i64, user_id: i64) {
        error!(
            "Plan generation failed for user {}, payment left without a plan",
            user_id
        );
        self.conversations
            .set(user_id, ConversationState::new(user_id))
            .await;
        if let Err(e) = self.notifier.send_text(chat_id, GENERATION_FAILED).await {
            error!("Failed to send apology to user {}: {:#}", user_id, e);
        }
    }
}
