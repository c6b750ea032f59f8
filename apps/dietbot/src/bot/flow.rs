//! Chat-side orchestration that does not depend on Telegram types: runs the
//! state machine under the user's lock, performs checkout effects and handles
//! the return from the payment page.

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::conversation::machine::{checkout_failed, checkout_started, transition};
use crate::conversation::{ConversationState, Effect, Input, Reply, Stage};
use crate::services::completion::CompletionOutcome;
use crate::services::order_service::Customer;
use crate::state::AppState;

pub const NO_PENDING_PAYMENT: &str =
    "I could not find a pending payment for you. Send /start to begin.";
pub const PAYMENT_NOT_CONFIRMED: &str =
    "Your payment has not been confirmed yet. I will send the plan as soon as it is.";
pub const PAYMENT_CHECK_FAILED: &str =
    "Sorry, I could not check your payment right now. Your plan will arrive once the payment is confirmed.";
pub const PAYMENT_THANKS: &str = "Thank you for your payment! Your diet plan is being prepared.";
pub const ALREADY_DELIVERED: &str = "Your diet plan for this payment has already been sent above.";

/// Feeds one input through the state machine and returns the replies to send.
pub async fn advance(app: &AppState, customer: &Customer, input: Input<'_>) -> Vec<Reply> {
    let user_id = customer.tg_id;
    let _lock = app.conversations.lock_user(user_id).await;

    let current = app
        .conversations
        .get(user_id)
        .await
        .unwrap_or_else(|| ConversationState::new(user_id));

    let step = transition(&current, input);
    let mut replies = step.replies;

    let next = match step.effect {
        Some(Effect::BeginCheckout(answers)) => {
            match app.orders.begin_checkout(customer, &answers).await {
                Ok(session) => {
                    let started = checkout_started(
                        &step.state,
                        answers,
                        session.id,
                        session.url,
                        &app.config.price_display(),
                    );
                    replies.extend(started.replies);
                    started.state
                }
                Err(e) => {
                    error!("Checkout failed for user {}: {:#}", user_id, e);
                    let failed = checkout_failed(&step.state);
                    replies.extend(failed.replies);
                    failed.state
                }
            }
        }
        None => step.state,
    };

    if next != current {
        debug!(
            "User {} moved {} -> {}",
            user_id,
            current.stage.name(),
            next.stage.name()
        );
        app.conversations.set(user_id, next).await;
    }

    replies
}

/// `/start payment_success`: confirms the session with Stripe, then runs the
/// completion handler in the background. Returns its handle when spawned.
pub async fn payment_success_returned(app: &AppState, customer: &Customer) -> Option<JoinHandle<()>> {
    let user_id = customer.tg_id;
    let stored = app.conversations.get(user_id).await;
    if stored
        .as_ref()
        .is_some_and(|state| matches!(state.stage, Stage::Complete))
    {
        info!("User {} returned from payment after delivery", user_id);
        notify(app, customer.chat_id, ALREADY_DELIVERED).await;
        return None;
    }

    let Some(session_ref) = stored.and_then(|state| state.pending_payment_ref) else {
        info!("User {} returned from payment without a pending session", user_id);
        notify(app, customer.chat_id, NO_PENDING_PAYMENT).await;
        return None;
    };

    match app.gateway.is_session_paid(&session_ref).await {
        Ok(true) => {}
        Ok(false) => {
            info!("Session {} of user {} is not paid yet", session_ref, user_id);
            notify(app, customer.chat_id, PAYMENT_NOT_CONFIRMED).await;
            return None;
        }
        Err(e) => {
            error!("Failed to check session {}: {:#}", session_ref, e);
            notify(app, customer.chat_id, PAYMENT_CHECK_FAILED).await;
            return None;
        }
    }

    notify(app, customer.chat_id, PAYMENT_THANKS).await;

    let app = app.clone();
    let chat_id = customer.chat_id;
    Some(tokio::spawn(async move {
        match app.completion.on_payment_confirmed(user_id, &session_ref).await {
            Ok(CompletionOutcome::Delivered) => {
                info!("Plan delivered to user {} via deep link", user_id)
            }
            Ok(CompletionOutcome::AlreadyCompleted) => {
                notify(&app, chat_id, ALREADY_DELIVERED).await;
            }
            Err(e) => error!("Completion for user {} failed: {}", user_id, e),
        }
    }))
}

async fn notify(app: &AppState, chat_id: i64, text: &str) {
    if let Err(e) = app.notifier.send_text(chat_id, text).await {
        warn!("Failed to notify chat {}: {:#}", chat_id, e);
    }
}
