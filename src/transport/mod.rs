//! Chat transport abstraction and implementations
//!
//! The conversation core never talks to a chat service directly. It consumes
//! [`InboundMessage`]s and issues outbound actions through the [`Transport`]
//! trait:
//!
//! - [`telegram::TelegramTransport`] -- Telegram Bot API over HTTPS long
//!   polling.
//! - [`fake::FakeTransport`] -- in-memory fake used by tests.
//!
//! # Canonical Import Path
//!
//! ```no_run
//! use image_utility_bot::transport::Transport;
//! ```

use crate::error::Result;
use crate::imaging::OutputFormat;
use bytes::Bytes;
use std::path::Path;

pub mod fake;
pub mod telegram;

/// Conversation identity
pub type ChatId = i64;

/// Identifier of a message sent by the bot
pub type MessageId = i64;

/// One event from one conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub event: InboundEvent,
}

impl InboundMessage {
    pub fn new(chat_id: ChatId, event: InboundEvent) -> Self {
        Self { chat_id, event }
    }
}

/// What the user sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Slash command, lower-cased and without the leading `/` (e.g. "start")
    Command(String),
    /// An uploaded image, native photo or file attachment
    Image(IncomingImage),
    /// Free text, including keyboard button presses
    Text(String),
}

/// How the image was attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Native photo, already re-encoded by the chat service
    Photo,
    /// File attachment carrying its own content type
    Document,
}

/// Reference to an uploaded image that still needs fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingImage {
    pub file_id: String,
    /// Declared MIME type, if the transport reports one
    pub content_type: Option<String>,
    pub source: ImageSource,
}

impl IncomingImage {
    /// A native photo upload
    pub fn photo(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            content_type: None,
            source: ImageSource::Photo,
        }
    }

    /// A document upload with a declared content type
    pub fn document(file_id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            content_type: Some(content_type.into()),
            source: ImageSource::Document,
        }
    }

    /// Extension for the local copy; photos arrive as JPEG
    pub fn extension(&self) -> &'static str {
        self.content_type
            .as_deref()
            .and_then(OutputFormat::from_mime)
            .map(|format| format.extension())
            .unwrap_or("jpg")
    }
}

/// Reply keyboard offered with a prompt, one button per row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<String>>,
}

impl Keyboard {
    /// One option per row
    pub fn single_column<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: options.into_iter().map(|o| vec![o.into()]).collect(),
        }
    }

    /// All button labels in order
    pub fn options(&self) -> Vec<String> {
        self.rows.iter().flatten().cloned().collect()
    }
}

/// Processed image handed back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPhoto {
    pub bytes: Bytes,
    pub file_name: String,
    pub caption: String,
    pub mime_type: String,
}

/// Abstraction over chat services
///
/// Used polymorphically through `Arc<dyn Transport>`. Errors are
/// [`crate::error::BotError`] values wrapped in `anyhow`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Fetch the next batch of inbound messages
    ///
    /// May wait (long polling) and may return an empty batch.
    async fn poll_updates(&self) -> Result<Vec<InboundMessage>>;

    /// Send a plain text message
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId>;

    /// Send a prompt with a one-time reply keyboard
    async fn send_keyboard(&self, chat: ChatId, text: &str, keyboard: &Keyboard)
        -> Result<MessageId>;

    /// Send a processed image with caption and filename
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BotError::DeliveryFailure`] on failure.
    async fn send_photo(&self, chat: ChatId, photo: OutboundPhoto) -> Result<MessageId>;

    /// Delete a message previously sent by the bot
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()>;

    /// Download an uploaded file to `destination`, returning its size
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BotError::DownloadFailure`]; no partial file
    /// is left at `destination`.
    async fn fetch_file(&self, file_id: &str, destination: &Path) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_extension_defaults_to_jpg() {
        assert_eq!(IncomingImage::photo("abc").extension(), "jpg");
    }

    #[test]
    fn test_document_extension_from_mime() {
        assert_eq!(IncomingImage::document("a", "image/png").extension(), "png");
        assert_eq!(
            IncomingImage::document("a", "image/webp").extension(),
            "webp"
        );
        assert_eq!(
            IncomingImage::document("a", "image/jpeg").extension(),
            "jpg"
        );
    }

    #[test]
    fn test_keyboard_options() {
        let keyboard = Keyboard::single_column(["1", "2"]);
        assert_eq!(
            keyboard.rows,
            vec![vec!["1".to_string()], vec!["2".to_string()]]
        );
        assert_eq!(keyboard.options(), vec!["1", "2"]);
    }
}
