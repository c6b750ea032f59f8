use std::future::Future;
use teloxide::prelude::*;
use tracing::{error, warn};

use crate::bot::keyboards::reply_markup;
use crate::conversation::Reply;

/// Runs one update's work on its own task so a panic drops only that update.
pub async fn run_isolated<F>(label: &'static str, user_id: i64, work: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{} for user {} failed: {:#}", label, user_id, e),
        Err(e) if e.is_panic() => {
            error!("{} for user {} panicked, update dropped: {}", label, user_id, e)
        }
        Err(e) => warn!("{} for user {} was cancelled: {}", label, user_id, e),
    }
}

pub async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<Reply>) -> anyhow::Result<()> {
    for reply in replies {
        let markup = match reply_markup(&reply.keyboard) {
            Ok(markup) => markup,
            Err(e) => {
                error!("Dropping keyboard for chat {}: {:#}", chat_id, e);
                None
            }
        };
        let request = bot.send_message(chat_id, reply.text);
        match markup {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
    }
    Ok(())
}

/// Splits `/cmd@bot arg` into `("cmd", Some("arg"))`.
pub fn parse_command(text: &str) -> Option<(&str, Option<&str>)> {
    let rest = text.strip_prefix('/')?;
    let (head, arg) = match rest.split_once(char::is_whitespace) {
        Some((head, arg)) => (head, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name, arg))
}
