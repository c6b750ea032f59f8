use teloxide::prelude::*;
use tracing::debug;

use crate::bot::flow;
use crate::bot::handlers::command::handle_command;
use crate::bot::utils::{parse_command, run_isolated, send_replies};
use crate::conversation::Input;
use crate::services::order_service::Customer;
use crate::AppState;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let customer = Customer {
        tg_id: from.id.0 as i64,
        chat_id: msg.chat.id.0,
        username: from.username.clone(),
    };
    let Some(text) = msg.text().map(str::to_owned) else {
        debug!("Ignoring non-text message from {}", customer.tg_id);
        return Ok(());
    };
    debug!("Received message from {}: {:?}", customer.tg_id, text);

    let chat_id = msg.chat.id;
    let user_id = customer.tg_id;
    run_isolated("message", user_id, async move {
        match parse_command(&text) {
            Some((name, arg)) => handle_command(&bot, &state, &customer, chat_id, name, arg).await,
            None => {
                let replies = flow::advance(&state, &customer, Input::Text(&text)).await;
                send_replies(&bot, chat_id, replies).await
            }
        }
    })
    .await;

    Ok(())
}
