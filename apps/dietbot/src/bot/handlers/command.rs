use teloxide::prelude::*;
use tracing::info;

use crate::bot::flow;
use crate::bot::utils::send_replies;
use crate::conversation::Input;
use crate::services::order_service::{Customer, PAYMENT_CANCEL_PARAM, PAYMENT_SUCCESS_PARAM};
use crate::AppState;

pub const UNKNOWN_COMMAND: &str = "Unknown command. Send /start to begin.";

pub async fn handle_command(
    bot: &Bot,
    state: &AppState,
    customer: &Customer,
    chat_id: ChatId,
    name: &str,
    arg: Option<&str>,
) -> anyhow::Result<()> {
    info!("User {} sent /{} {:?}", customer.tg_id, name, arg);

    let input = match (name, arg) {
        ("start", Some(PAYMENT_SUCCESS_PARAM)) => {
            flow::payment_success_returned(state, customer).await;
            return Ok(());
        }
        ("start", Some(PAYMENT_CANCEL_PARAM)) => Input::PaymentCancelled,
        ("start", _) => Input::Start,
        ("help", _) => Input::Help,
        _ => {
            bot.send_message(chat_id, UNKNOWN_COMMAND).await?;
            return Ok(());
        }
    };

    let replies = flow::advance(state, customer, input).await;
    send_replies(bot, chat_id, replies).await
}
