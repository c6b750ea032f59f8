use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::state::ConversationState;

/// Held for the duration of one read-modify-write cycle on a user's conversation.
pub struct UserLock {
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, user_id: i64) -> Option<ConversationState>;

    async fn set(&self, user_id: i64, state: ConversationState);

    /// Applies `f` to the stored state if there is one. Returns whether a state existed.
    async fn mutate(
        &self,
        user_id: i64,
        f: Box<dyn for<'a> FnOnce(&'a mut ConversationState) + Send + 'static>,
    ) -> bool;

    /// Serialises every multi-step update for one user: chat transitions,
    /// checkout creation and payment completion all run under this lock.
    async fn lock_user(&self, user_id: i64) -> UserLock;
}

/// Process-local store. States live until restart; nothing is evicted.
#[derive(Default)]
pub struct InMemoryConversationStore {
    states: RwLock<HashMap<i64, ConversationState>>,
    user_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, user_id: i64) -> Option<ConversationState> {
        self.states.read().await.get(&user_id).cloned()
    }

    async fn set(&self, user_id: i64, state: ConversationState) {
        self.states.write().await.insert(user_id, state);
    }

    async fn mutate(
        &self,
        user_id: i64,
        f: Box<dyn for<'a> FnOnce(&'a mut ConversationState) + Send + 'static>,
    ) -> bool {
        let mut states = self.states.write().await;
        match states.get_mut(&user_id) {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }

    async fn lock_user(&self, user_id: i64) -> UserLock {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            locks.entry(user_id).or_default().clone()
        };
        UserLock {
            _guard: lock.lock_owned().await,
        }
    }
}
