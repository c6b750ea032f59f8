use std::sync::Arc;

use crate::config::AppConfig;
use crate::conversation::ConversationStore;
use crate::services::completion::PaymentCompletionHandler;
use crate::services::notifier::Notifier;
use crate::services::order_service::OrderService;
use crate::services::stripe::PaymentGateway;

/// Shared by the bot dispatcher and the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub conversations: Arc<dyn ConversationStore>,
    pub orders: Arc<OrderService>,
    pub completion: Arc<PaymentCompletionHandler>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}
