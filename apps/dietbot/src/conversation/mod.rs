pub mod machine;
pub mod state;
pub mod store;

pub use machine::{Effect, Input, Keyboard, Reply};
pub use state::{Answers, ConversationState, Gender, Goal, Stage};
pub use store::{ConversationStore, InMemoryConversationStore};
