use anyhow::{Context, Result};
use dietbot_db::models::NewUserProfile;
use dietbot_db::repositories::{PaymentStore, UserStore};
use std::sync::Arc;
use tracing::{info, warn};

use crate::conversation::Answers;
use crate::services::stripe::{CheckoutSession, PaymentGateway};

pub const PAYMENT_SUCCESS_PARAM: &str = "payment_success";
pub const PAYMENT_CANCEL_PARAM: &str = "payment_cancel";

pub fn deep_link(bot_username: &str, param: &str) -> String {
    format!(
        "https://t.me/{}?start={}",
        bot_username.trim_start_matches('@'),
        param
    )
}

/// Who pressed "Yes" on the confirmation keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub tg_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
}

pub struct OrderService {
    users: Arc<dyn UserStore>,
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    price_amount: i64,
    currency: String,
    success_url: String,
    cancel_url: String,
}

impl OrderService {
    pub fn new(
        users: Arc<dyn UserStore>,
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        price_amount: i64,
        currency: String,
        bot_username: &str,
    ) -> Self {
        Self {
            users,
            payments,
            gateway,
            price_amount,
            currency,
            success_url: deep_link(bot_username, PAYMENT_SUCCESS_PARAM),
            cancel_url: deep_link(bot_username, PAYMENT_CANCEL_PARAM),
        }
    }

    /// Saves the profile, retires earlier pending payments, opens a checkout
    /// session and records it as the user's only pending payment.
    pub async fn begin_checkout(
        &self,
        customer: &Customer,
        answers: &Answers,
    ) -> Result<CheckoutSession> {
        let profile = self
            .users
            .upsert(&NewUserProfile {
                tg_id: customer.tg_id,
                chat_id: customer.chat_id,
                username: customer.username.clone(),
                gender: answers.gender.as_str().to_string(),
                height_cm: i32::from(answers.height_cm),
                weight_kg: i32::from(answers.weight_kg),
                goal: answers.goal.as_str().to_string(),
            })
            .await
            .context("Failed to save user profile")?;

        let superseded = self
            .payments
            .supersede_pending(profile.id)
            .await
            .context("Failed to retire pending payments")?;
        if superseded > 0 {
            warn!(
                "User {} had {} pending payment(s), marked failed",
                customer.tg_id, superseded
            );
        }

        let session = self
            .gateway
            .create_checkout_session(customer.tg_id, &self.success_url, &self.cancel_url)
            .await
            .context("Failed to create checkout session")?;

        self.payments
            .create_pending(profile.id, self.price_amount, &self.currency, &session.id)
            .await
            .context("Failed to record pending payment")?;

        info!(
            "Checkout session {} created for user {}",
            session.id, customer.tg_id
        );
        Ok(session)
    }
}
