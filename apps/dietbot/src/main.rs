use anyhow::{Context, Result};
use dietbot_db::repositories::{PaymentRepository, PlanRepository, UserRepository};
use std::io;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bot;
mod config;
mod conversation;
mod http;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use crate::config::AppConfig;
use crate::conversation::InMemoryConversationStore;
use crate::services::completion::PaymentCompletionHandler;
use crate::services::notifier::TelegramNotifier;
use crate::services::order_service::OrderService;
use crate::services::plan_generator::OpenAiPlanGenerator;
use crate::services::stripe::StripeClient;
pub use crate::state::AppState;

fn init_tracing(config: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", &config.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dietbot=debug,dietbot_db=info,tower_http=info,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();
    guard
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        println!("⚠️  Warning: Failed to load .env file: {}", e);
    }

    let config = AppConfig::load()?;
    let _guard = init_tracing(&config);
    info!("Starting dietbot...");

    let pool = dietbot_db::init_db(&config.database_url, config.db_max_connections).await?;

    let bot = Bot::new(&config.telegram_token);
    let me = bot
        .get_me()
        .await
        .context("Bot failed to connect to Telegram")?;
    let bot_username = me
        .username
        .clone()
        .context("Bot account has no username, deep links need one")?;
    info!("Bot connected as: @{}", bot_username);

    let users = Arc::new(UserRepository::new(pool.clone()));
    let payments = Arc::new(PaymentRepository::new(pool.clone()));
    let plans = Arc::new(PlanRepository::new(pool.clone()));
    let conversations = Arc::new(InMemoryConversationStore::new());
    let gateway = Arc::new(StripeClient::new(
        config.stripe_secret_key.clone(),
        config.stripe_price_id.clone(),
    ));
    let generator = Arc::new(OpenAiPlanGenerator::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    ));
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));

    let orders = OrderService::new(
        users.clone(),
        payments.clone(),
        gateway.clone(),
        config.price_amount,
        config.price_currency.clone(),
        &bot_username,
    );
    let completion = PaymentCompletionHandler::new(
        users,
        payments,
        plans,
        conversations.clone(),
        generator,
        notifier.clone(),
        config.plan_timeout(),
    );

    let listener = http::bind(config.server_port).await?;
    let grace = config.shutdown_grace();
    let state = AppState {
        config: Arc::new(config),
        conversations,
        orders: Arc::new(orders),
        completion: Arc::new(completion),
        gateway,
        notifier,
    };

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let server = tokio::spawn(http::serve(
        listener,
        state.clone(),
        shutdown_tx.subscribe(),
    ));
    let dispatcher = tokio::spawn(bot::run_bot(bot, shutdown_tx.subscribe(), state));

    shutdown_signal().await;
    info!("Shutdown requested, stopping bot and HTTP server...");
    let _ = shutdown_tx.send(());

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {:#}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }
    if let Err(e) = dispatcher.await {
        error!("Bot task failed: {}", e);
    }

    // In-flight completions get a short window before the runtime drops them.
    tokio::time::sleep(grace).await;
    info!("Goodbye");
    Ok(())
}
