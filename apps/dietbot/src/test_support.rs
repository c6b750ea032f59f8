//! In-memory stand-ins for the database, Stripe, the completion API and
//! Telegram, plus a harness wiring them into the real services.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use dietbot_db::models::{GeneratedPlan, NewUserProfile, PaymentRecord, PaymentStatus, UserProfile};
use dietbot_db::repositories::{PaymentStore, PlanStore, UserStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::AppConfig;
use crate::conversation::{
    Answers, ConversationState, ConversationStore, Gender, Goal, InMemoryConversationStore, Stage,
};
use crate::services::completion::PaymentCompletionHandler;
use crate::services::notifier::Notifier;
use crate::services::order_service::{Customer, OrderService};
use crate::services::plan_generator::PlanGenerator;
use crate::services::stripe::{CheckoutSession, PaymentGateway};
use crate::state::AppState;

pub const BOT_USERNAME: &str = "diet_bot";

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<UserProfile>>,
}

impl MemoryUserStore {
    pub fn all(&self) -> Vec<UserProfile> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(&self, profile: &NewUserProfile) -> Result<UserProfile> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        if let Some(row) = rows.iter_mut().find(|u| u.tg_id == profile.tg_id) {
            row.chat_id = profile.chat_id;
            row.username = profile.username.clone();
            row.gender = profile.gender.clone();
            row.height_cm = profile.height_cm;
            row.weight_kg = profile.weight_kg;
            row.goal = profile.goal.clone();
            row.updated_at = now;
            return Ok(row.clone());
        }
        let row = UserProfile {
            id: rows.len() as i64 + 1,
            tg_id: profile.tg_id,
            chat_id: profile.chat_id,
            username: profile.username.clone(),
            gender: profile.gender.clone(),
            height_cm: profile.height_cm,
            weight_kg: profile.weight_kg,
            goal: profile.goal.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<UserProfile>> {
        Ok(self.all().into_iter().find(|u| u.tg_id == tg_id))
    }
}

#[derive(Default)]
pub struct MemoryPaymentStore {
    rows: Mutex<Vec<PaymentRecord>>,
}

impl MemoryPaymentStore {
    pub fn all(&self) -> Vec<PaymentRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn status_of(&self, session_ref: &str) -> Option<PaymentStatus> {
        self.all()
            .into_iter()
            .find(|p| p.session_ref == session_ref)
            .map(|p| p.status)
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn create_pending(
        &self,
        user_id: i64,
        amount: i64,
        currency: &str,
        session_ref: &str,
    ) -> Result<PaymentRecord> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|p| p.session_ref == session_ref) {
            return Err(anyhow!("duplicate session_ref {}", session_ref));
        }
        let now = Utc::now();
        let row = PaymentRecord {
            id: rows.len() as i64 + 1,
            user_id,
            amount,
            currency: currency.to_string(),
            session_ref: session_ref.to_string(),
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn supersede_pending(&self, user_id: i64) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut changed = 0;
        for row in rows
            .iter_mut()
            .filter(|p| p.user_id == user_id && p.status == PaymentStatus::Pending)
        {
            row.status = PaymentStatus::Failed;
            changed += 1;
        }
        Ok(changed)
    }

    async fn update_status(&self, session_ref: &str, status: PaymentStatus) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|p| p.session_ref == session_ref) {
            Some(row) => {
                row.status = status;
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_by_session_ref(&self, session_ref: &str) -> Result<Option<PaymentRecord>> {
        Ok(self.all().into_iter().find(|p| p.session_ref == session_ref))
    }
}

/// Needs the payment store to enforce "plans only for completed payments".
pub struct MemoryPlanStore {
    rows: Mutex<Vec<GeneratedPlan>>,
    payments: Arc<MemoryPaymentStore>,
    fail_writes: AtomicBool,
}

impl MemoryPlanStore {
    pub fn new(payments: Arc<MemoryPaymentStore>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            payments,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn all(&self) -> Vec<GeneratedPlan> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn insert_unchecked(&self, user_id: i64, payment_id: i64, plan_text: &str) {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(GeneratedPlan {
            id,
            user_id,
            payment_id,
            plan_text: plan_text.to_string(),
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn create(&self, user_id: i64, payment_id: i64, plan_text: &str) -> Result<GeneratedPlan> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("database unavailable"));
        }
        let completed = self
            .payments
            .all()
            .iter()
            .any(|p| p.id == payment_id && p.status == PaymentStatus::Completed);
        if !completed {
            return Err(anyhow!("payment {} is not completed", payment_id));
        }
        if self.all().iter().any(|p| p.payment_id == payment_id) {
            return Err(anyhow!("plan for payment {} already exists", payment_id));
        }
        self.insert_unchecked(user_id, payment_id, plan_text);
        self.all()
            .pop()
            .ok_or_else(|| anyhow!("plan insert lost"))
    }

    async fn get_by_payment_id(&self, payment_id: i64) -> Result<Option<GeneratedPlan>> {
        Ok(self.all().into_iter().find(|p| p.payment_id == payment_id))
    }
}

#[derive(Default)]
pub struct FakeGateway {
    sessions: AtomicUsize,
    fail_checkout: AtomicBool,
    paid: Mutex<HashMap<String, bool>>,
    success_urls: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn fail_checkout(&self, fail: bool) {
        self.fail_checkout.store(fail, Ordering::SeqCst);
    }

    pub fn mark_paid(&self, session_id: &str) {
        self.paid.lock().unwrap().insert(session_id.to_string(), true);
    }

    pub fn success_urls(&self) -> Vec<String> {
        self.success_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        _tg_id: i64,
        success_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutSession> {
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(anyhow!("stripe is down"));
        }
        self.success_urls
            .lock()
            .unwrap()
            .push(success_url.to_string());
        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("cs_test_{}", n);
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{}", id),
            id,
        })
    }

    async fn is_session_paid(&self, session_id: &str) -> Result<bool> {
        Ok(self
            .paid
            .lock()
            .unwrap()
            .get(session_id)
            .copied()
            .unwrap_or(false))
    }
}

#[derive(Default)]
pub struct FakeGenerator {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Duration>,
    plan: Mutex<Option<String>>,
}

impl FakeGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_plan(&self, plan: String) {
        *self.plan.lock().unwrap() = Some(plan);
    }
}

#[async_trait]
impl PlanGenerator for FakeGenerator {
    async fn generate(&self, profile: &UserProfile) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("model overloaded"));
        }
        let custom = self.plan.lock().unwrap().clone();
        Ok(custom.unwrap_or_else(|| format!("Plan for user {}", profile.tg_id)))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
    failed: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn failed_sends(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Polls until `count` messages reached `chat_id` or a second has passed.
    pub async fn wait_for(&self, chat_id: i64, count: usize) -> Vec<String> {
        for _ in 0..100 {
            let texts = self.texts_to(chat_id);
            if texts.len() >= count {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.texts_to(chat_id)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(anyhow!("telegram down"));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub config: AppConfig,
    pub users: Arc<MemoryUserStore>,
    pub payments: Arc<MemoryPaymentStore>,
    pub plans: Arc<MemoryPlanStore>,
    pub conversations: Arc<InMemoryConversationStore>,
    pub gateway: Arc<FakeGateway>,
    pub generator: Arc<FakeGenerator>,
    pub notifier: Arc<RecordingNotifier>,
    pub plan_timeout: Duration,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::for_tests())
    }

    pub fn with_plan_timeout(timeout: Duration) -> Self {
        Self {
            plan_timeout: timeout,
            ..Self::new()
        }
    }

    pub fn with_config(config: AppConfig) -> Self {
        let payments = Arc::new(MemoryPaymentStore::default());
        Self {
            plan_timeout: config.plan_timeout(),
            config,
            users: Arc::new(MemoryUserStore::default()),
            plans: Arc::new(MemoryPlanStore::new(payments.clone())),
            payments,
            conversations: Arc::new(InMemoryConversationStore::new()),
            gateway: Arc::new(FakeGateway::default()),
            generator: Arc::new(FakeGenerator::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn customer(&self, tg_id: i64) -> Customer {
        Customer {
            tg_id,
            chat_id: tg_id,
            username: Some(format!("user{}", tg_id)),
        }
    }

    pub fn answers() -> Answers {
        Answers {
            gender: Gender::Male,
            height_cm: 175,
            weight_kg: 70,
            goal: Goal::Reduce,
        }
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(
            self.users.clone(),
            self.payments.clone(),
            self.gateway.clone(),
            self.config.price_amount,
            self.config.price_currency.clone(),
            BOT_USERNAME,
        )
    }

    pub fn completion(&self) -> PaymentCompletionHandler {
        PaymentCompletionHandler::new(
            self.users.clone(),
            self.payments.clone(),
            self.plans.clone(),
            self.conversations.clone(),
            self.generator.clone(),
            self.notifier.clone(),
            self.plan_timeout,
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            config: Arc::new(self.config.clone()),
            conversations: self.conversations.clone(),
            orders: Arc::new(self.orders()),
            completion: Arc::new(self.completion()),
            gateway: self.gateway.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Runs a checkout for `tg_id` and parks the conversation at the payment
    /// step. Returns the session reference.
    pub async fn checkout(&self, tg_id: i64) -> String {
        let session = self
            .orders()
            .begin_checkout(&self.customer(tg_id), &Self::answers())
            .await
            .unwrap();
        self.conversations
            .set(
                tg_id,
                ConversationState {
                    user_id: tg_id,
                    stage: Stage::Payment {
                        answers: Self::answers(),
                    },
                    pending_payment_ref: Some(session.id.clone()),
                },
            )
            .await;
        session.id
    }

    pub async fn stage_of(&self, tg_id: i64) -> Option<Stage> {
        self.conversations.get(tg_id).await.map(|s| s.stage)
    }
}
