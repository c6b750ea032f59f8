use anyhow::{Context, Result};
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove,
    ReplyMarkup,
};

use crate::conversation::Keyboard;

pub fn choices(rows: &[Vec<String>]) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.iter()
            .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    )
    .resize_keyboard()
}

pub fn pay_link(label: &str, url: &str) -> Result<InlineKeyboardMarkup> {
    let url = url
        .parse()
        .with_context(|| format!("Invalid checkout URL: {}", url))?;
    Ok(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        label.to_string(),
        url,
    )]]))
}

/// Telegram markup for a reply, `None` when the message carries no keyboard.
pub fn reply_markup(keyboard: &Keyboard) -> Result<Option<ReplyMarkup>> {
    Ok(match keyboard {
        Keyboard::None => None,
        Keyboard::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        Keyboard::Choices(rows) => Some(ReplyMarkup::Keyboard(choices(rows))),
        Keyboard::PayLink { label, url } => Some(ReplyMarkup::InlineKeyboard(pay_link(label, url)?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::machine::{gender_keyboard, goal_keyboard};

    #[test]
    fn choice_rows_keep_their_layout() {
        let Some(ReplyMarkup::Keyboard(markup)) = reply_markup(&goal_keyboard()).unwrap() else {
            panic!("expected a reply keyboard");
        };
        let rows: Vec<Vec<&str>> = markup
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.as_str()).collect())
            .collect();
        assert_eq!(rows, vec![vec!["Lose weight", "Maintain weight"], vec!["Gain weight"]]);
        assert!(matches!(
            reply_markup(&gender_keyboard()).unwrap(),
            Some(ReplyMarkup::Keyboard(_))
        ));
    }

    #[test]
    fn pay_link_becomes_inline_url_button() {
        let keyboard = Keyboard::PayLink {
            label: "💳 Pay".into(),
            url: "https://checkout.stripe.com/c/pay/cs_1".into(),
        };
        assert!(matches!(
            reply_markup(&keyboard).unwrap(),
            Some(ReplyMarkup::InlineKeyboard(_))
        ));
    }

    #[test]
    fn bad_url_is_an_error() {
        let keyboard = Keyboard::PayLink {
            label: "Pay".into(),
            url: "not a url".into(),
        };
        assert!(reply_markup(&keyboard).is_err());
    }

    #[test]
    fn plain_and_remove() {
        assert!(reply_markup(&Keyboard::None).unwrap().is_none());
        assert!(matches!(
            reply_markup(&Keyboard::Remove).unwrap(),
            Some(ReplyMarkup::KeyboardRemove(_))
        ));
    }
}
