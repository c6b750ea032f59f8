use teloxide::prelude::*;
use tracing::info;

/// The bot sends no callback buttons; stray queries are acknowledged so the
/// client stops its spinner.
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback from {}: {:?}", q.from.id.0, q.data);
    bot.answer_callback_query(q.id).await?;
    Ok(())
}
