//! Per-conversation session data
//!
//! The state of a conversation is derived from its session: no session means
//! the bot waits for an upload, a session without an operation waits for the
//! operation choice, and a session with one waits for the size choice.

use crate::imaging::Operation;
use crate::transport::ChatId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where a conversation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingUpload,
    AwaitingOperationChoice,
    AwaitingSizeChoice,
}

/// Transient data for one in-flight upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    /// Local copy of the upload
    pub source_file: PathBuf,
    pub operation: Option<Operation>,
    pub started_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(source_file: impl Into<PathBuf>) -> Self {
        Self {
            source_file: source_file.into(),
            operation: None,
            started_at: Utc::now(),
        }
    }

    pub fn state(&self) -> ConversationState {
        match self.operation {
            None => ConversationState::AwaitingOperationChoice,
            Some(_) => ConversationState::AwaitingSizeChoice,
        }
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }
}

/// Derive the state of a conversation from its (optional) session
pub fn state_of(session: Option<&ConversationSession>) -> ConversationState {
    session.map_or(
        ConversationState::AwaitingUpload,
        ConversationSession::state,
    )
}

/// Session map shared by all conversation workers
///
/// Cloning is cheap; all clones see the same map. Entries are keyed by
/// conversation and never read across conversations.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<ChatId, ConversationSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session for `chat`
    pub async fn put(&self, chat: ChatId, session: ConversationSession) {
        self.inner.write().await.insert(chat, session);
    }

    pub async fn get(&self, chat: ChatId) -> Option<ConversationSession> {
        self.inner.read().await.get(&chat).cloned()
    }

    /// Remove and return the session for `chat`
    pub async fn clear(&self, chat: ChatId) -> Option<ConversationSession> {
        self.inner.write().await.remove(&chat)
    }

    pub async fn state(&self, chat: ChatId) -> ConversationState {
        state_of(self.inner.read().await.get(&chat))
    }

    /// Number of open sessions
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::OutputFormat;

    #[test]
    fn test_state_derivation() {
        assert_eq!(state_of(None), ConversationState::AwaitingUpload);

        let mut session = ConversationSession::new("/tmp/a.jpg");
        assert_eq!(
            state_of(Some(&session)),
            ConversationState::AwaitingOperationChoice
        );

        session.operation = Some(Operation::ConvertTo(OutputFormat::Png));
        assert_eq!(session.state(), ConversationState::AwaitingSizeChoice);
    }

    #[tokio::test]
    async fn test_put_get_clear() {
        let store = SessionStore::new();
        assert!(store.get(1).await.is_none());

        store.put(1, ConversationSession::new("a.jpg")).await;
        assert_eq!(
            store.get(1).await.unwrap().source_file,
            PathBuf::from("a.jpg")
        );
        assert_eq!(
            store.state(1).await,
            ConversationState::AwaitingOperationChoice
        );
        assert_eq!(store.len().await, 1);

        let removed = store.clear(1).await.unwrap();
        assert_eq!(removed.source_file, PathBuf::from("a.jpg"));
        assert!(store.clear(1).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let store = SessionStore::new();
        store.put(1, ConversationSession::new("one.jpg")).await;
        store.put(2, ConversationSession::new("two.jpg")).await;

        store.clear(1).await;
        assert_eq!(
            store.get(2).await.unwrap().source_file,
            PathBuf::from("two.jpg")
        );
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        store.put(9, ConversationSession::new("x.png")).await;
        assert!(other.get(9).await.is_some());
    }
}
