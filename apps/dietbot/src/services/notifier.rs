use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;

/// Telegram rejects longer message texts.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .with_context(|| format!("Failed to send message to chat {}", chat_id))?;
        Ok(())
    }
}

/// Splits `text` into chunks of at most `limit` characters, breaking on line
/// boundaries where possible. A single line longer than `limit` is cut hard.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let mut rest: Vec<char> = line.chars().collect();
            while rest.len() > limit {
                chunks.push(rest.drain(..limit).collect());
            }
            current = rest.into_iter().collect();
            current_len = current.chars().count();
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
