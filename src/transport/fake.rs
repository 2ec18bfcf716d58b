//! In-memory fake transport for unit and integration tests
//!
//! [`FakeTransport`] replaces the chat service in tests:
//!
//! - queue inbound messages with [`FakeTransport::push_update`]
//! - register downloadable files with [`FakeTransport::register_file`]
//! - inspect what the bot sent with [`FakeTransport::outbound`]
//! - simulate outages with [`FakeTransport::fail_fetches`] and
//!   [`FakeTransport::fail_deliveries`]
//!
//! # Example
//!
//! ```
//! use image_utility_bot::transport::fake::{FakeTransport, Outbound};
//! use image_utility_bot::transport::Transport;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let transport = FakeTransport::new();
//! transport.send_text(7, "hello").await.unwrap();
//!
//! let sent = transport.outbound_for(7).await;
//! assert_eq!(sent, vec![Outbound::Text { chat: 7, text: "hello".into() }]);
//! # }
//! ```

use super::{ChatId, InboundEvent, InboundMessage, Keyboard, MessageId, OutboundPhoto, Transport};
use crate::error::{BotError, Result};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// An action the bot performed through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text {
        chat: ChatId,
        text: String,
    },
    Keyboard {
        chat: ChatId,
        text: String,
        options: Vec<String>,
    },
    Photo {
        chat: ChatId,
        photo: OutboundPhoto,
    },
    Deleted {
        chat: ChatId,
        message: MessageId,
    },
}

impl Outbound {
    pub fn chat(&self) -> ChatId {
        match self {
            Self::Text { chat, .. }
            | Self::Keyboard { chat, .. }
            | Self::Photo { chat, .. }
            | Self::Deleted { chat, .. } => *chat,
        }
    }

    /// Text or prompt carried by the action, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } | Self::Keyboard { text, .. } => Some(text.as_str()),
            Self::Photo { photo, .. } => Some(photo.caption.as_str()),
            Self::Deleted { .. } => None,
        }
    }
}

/// In-memory [`Transport`]
#[derive(Debug, Default)]
pub struct FakeTransport {
    updates: Mutex<VecDeque<InboundMessage>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    outbound: Mutex<Vec<Outbound>>,
    next_message_id: AtomicI64,
    fail_fetch: AtomicBool,
    fail_delivery: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound message for the next `poll_updates`
    pub async fn push_update(&self, chat: ChatId, event: InboundEvent) {
        self.updates
            .lock()
            .await
            .push_back(InboundMessage::new(chat, event));
    }

    /// Make `bytes` downloadable under `file_id`
    pub async fn register_file(&self, file_id: impl Into<String>, bytes: Vec<u8>) {
        self.files.lock().await.insert(file_id.into(), bytes);
    }

    /// Make every `fetch_file` fail after writing a partial file
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make every `send_photo` fail
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail_delivery.store(fail, Ordering::SeqCst);
    }

    /// Everything sent so far, in order
    pub async fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().await.clone()
    }

    /// Everything sent to one conversation, in order
    pub async fn outbound_for(&self, chat: ChatId) -> Vec<Outbound> {
        self.outbound
            .lock()
            .await
            .iter()
            .filter(|o| o.chat() == chat)
            .cloned()
            .collect()
    }

    /// The last action sent to `chat`
    pub async fn last_for(&self, chat: ChatId) -> Option<Outbound> {
        self.outbound_for(chat).await.pop()
    }

    /// Photos delivered to `chat`
    pub async fn photos_for(&self, chat: ChatId) -> Vec<OutboundPhoto> {
        self.outbound_for(chat)
            .await
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Photo { photo, .. } => Some(photo),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded outbound actions
    pub async fn clear_outbound(&self) {
        self.outbound.lock().await.clear();
    }

    async fn record(&self, action: Outbound) -> MessageId {
        self.outbound.lock().await.push(action);
        self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn poll_updates(&self) -> Result<Vec<InboundMessage>> {
        let batch: Vec<_> = self.updates.lock().await.drain(..).collect();
        if batch.is_empty() {
            // Stand-in for the long-poll wait
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(batch)
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId> {
        Ok(self
            .record(Outbound::Text {
                chat,
                text: text.to_string(),
            })
            .await)
    }

    async fn send_keyboard(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageId> {
        Ok(self
            .record(Outbound::Keyboard {
                chat,
                text: text.to_string(),
                options: keyboard.options(),
            })
            .await)
    }

    async fn send_photo(&self, chat: ChatId, photo: OutboundPhoto) -> Result<MessageId> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(BotError::DeliveryFailure("simulated delivery outage".into()).into());
        }
        Ok(self.record(Outbound::Photo { chat, photo }).await)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        self.record(Outbound::Deleted { chat, message }).await;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str, destination: &Path) -> Result<u64> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            // Leave a partial file behind so callers' cleanup is exercised
            tokio::fs::write(destination, b"partial").await?;
            return Err(BotError::DownloadFailure("simulated network failure".into()).into());
        }

        let bytes = self
            .files
            .lock()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| BotError::DownloadFailure(format!("unknown file id: {}", file_id)))?;

        tokio::fs::write(destination, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_poll_drains_queue() {
        let transport = FakeTransport::new();
        transport
            .push_update(1, InboundEvent::Text("hi".into()))
            .await;

        let batch = transport.poll_updates().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert!(transport.poll_updates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_ids_are_unique() {
        let transport = FakeTransport::new();
        let a = transport.send_text(1, "a").await.unwrap();
        let b = transport.send_text(1, "b").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_fetch_registered_file() {
        let dir = TempDir::new().unwrap();
        let transport = FakeTransport::new();
        transport.register_file("f1", vec![1, 2, 3]).await;

        let dest = dir.path().join("out.bin");
        let size = transport.fetch_file("f1", &dest).await.unwrap();
        assert_eq!(size, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_unknown_file_is_download_failure() {
        let dir = TempDir::new().unwrap();
        let transport = FakeTransport::new();
        let err = transport
            .fetch_file("missing", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BotError>(),
            Some(BotError::DownloadFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_delivery_failure_switch() {
        let transport = FakeTransport::new();
        transport.fail_deliveries(true);
        let photo = OutboundPhoto {
            bytes: bytes::Bytes::from_static(b"x"),
            file_name: "processed.png".into(),
            caption: "c".into(),
            mime_type: "image/png".into(),
        };
        assert!(transport.send_photo(1, photo).await.is_err());
        assert!(transport.outbound().await.is_empty());
    }
}
