pub mod completion;
pub mod notifier;
pub mod order_service;
pub mod plan_generator;
pub mod stripe;
