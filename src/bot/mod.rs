//! Conversation layer
//!
//! - [`menu`]: menu tables, token parsing, prompts
//! - [`session`]: per-conversation state and the shared store
//! - [`machine`]: the state machine driving one conversation
//! - [`dispatcher`]: one sequential worker per conversation

pub mod dispatcher;
pub mod machine;
pub mod menu;
pub mod session;

pub use dispatcher::Dispatcher;
pub use machine::ConversationMachine;
pub use session::{ConversationSession, ConversationState, SessionStore};
