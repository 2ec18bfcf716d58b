//! Telegram Bot API transport
//!
//! Long-polls `getUpdates`, answers with `sendMessage` / `sendPhoto` /
//! `sendDocument`, and downloads uploads via `getFile`. JPEG and PNG results
//! go out as photos; every other format is sent as a document so the service
//! does not re-encode it.

use super::{
    ChatId, ImageSource, InboundEvent, InboundMessage, IncomingImage, Keyboard, MessageId,
    OutboundPhoto, Transport,
};
use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
    photo: Option<Vec<PhotoSize>>,
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct Document {
    file_id: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct KeyboardButton<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplyKeyboardMarkup<'a> {
    keyboard: Vec<Vec<KeyboardButton<'a>>>,
    resize_keyboard: bool,
    one_time_keyboard: bool,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyKeyboardMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct DeleteMessageRequest {
    chat_id: ChatId,
    message_id: MessageId,
}

/// Map a raw update onto an inbound event
///
/// Photos use the largest size offered. Commands keep only the command word,
/// without the leading slash or a `@botname` suffix. Updates with nothing the
/// bot understands (stickers, edits, joins) map to `None`.
fn parse_update(update: Update) -> Option<InboundMessage> {
    let message = update.message?;
    let chat_id = message.chat.id;

    if let Some(photos) = message.photo {
        let largest = photos
            .into_iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))?;
        return Some(InboundMessage::new(
            chat_id,
            InboundEvent::Image(IncomingImage {
                file_id: largest.file_id,
                content_type: None,
                source: ImageSource::Photo,
            }),
        ));
    }

    if let Some(document) = message.document {
        return Some(InboundMessage::new(
            chat_id,
            InboundEvent::Image(IncomingImage {
                file_id: document.file_id,
                content_type: document.mime_type,
                source: ImageSource::Document,
            }),
        ));
    }

    let text = message.text?;
    let event = match text.trim().strip_prefix('/') {
        Some(command) => {
            let word = command.split_whitespace().next().unwrap_or_default();
            let name = word.split('@').next().unwrap_or_default();
            InboundEvent::Command(name.to_ascii_lowercase())
        }
        None => InboundEvent::Text(text),
    };
    Some(InboundMessage::new(chat_id, event))
}

/// Telegram Bot API client
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    token: String,
    poll_timeout: Duration,
    request_timeout: Duration,
    offset: AtomicI64,
}

impl fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl TelegramTransport {
    /// Create a client for the bot identified by `token`
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Transport`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use image_utility_bot::config::TelegramConfig;
    /// use image_utility_bot::transport::telegram::TelegramTransport;
    ///
    /// let transport = TelegramTransport::new(&TelegramConfig::default(), "123:abc".into())?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn new(config: &TelegramConfig, token: String) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.request_timeout_seconds);
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BotError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds),
            request_timeout,
            offset: AtomicI64::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    /// Describe a failed request without the token-bearing URL
    fn request_failed(&self, what: &str, e: reqwest::Error) -> String {
        let message = format!("{} failed: {}", what, e.without_url());
        if self.token.is_empty() {
            message
        } else {
            message.replace(&self.token, "<redacted>")
        }
    }

    /// Decode a Bot API envelope, turning `ok: false` into an error
    async fn unwrap_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> std::result::Result<T, String> {
        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| {
                format!(
                    "{} returned an unreadable body ({}): {}",
                    method,
                    status,
                    e.without_url()
                )
            })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(format!(
                "{} failed ({}): {}",
                method,
                status,
                description.unwrap_or_else(|| "no description".to_string())
            )),
        }
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> std::result::Result<T, String> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_failed(&format!("{} request", method), e))?;
        Self::unwrap_response(method, response).await
    }

    async fn download(
        &self,
        file_id: &str,
        destination: &Path,
    ) -> std::result::Result<u64, String> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(|e| self.request_failed("getFile request", e))?;
        let file: File = Self::unwrap_response("getFile", response).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| "getFile returned no file_path".to_string())?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| self.request_failed("file download", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("file download returned {}", status));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.request_failed("file download body", e))?;

        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| format!("cannot write {}: {}", destination.display(), e))?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn poll_updates(&self) -> Result<Vec<InboundMessage>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout.as_secs().to_string()),
            ])
            .timeout(self.poll_timeout + self.request_timeout)
            .send()
            .await
            .map_err(|e| BotError::Transport(self.request_failed("getUpdates request", e)))?;

        let updates: Vec<Update> = Self::unwrap_response("getUpdates", response)
            .await
            .map_err(BotError::Transport)?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::SeqCst);
        }

        let count = updates.len();
        let messages: Vec<_> = updates.into_iter().filter_map(parse_update).collect();
        tracing::trace!(
            updates = count,
            messages = messages.len(),
            "Polled Telegram"
        );
        Ok(messages)
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId> {
        let request = SendMessageRequest {
            chat_id: chat,
            text,
            reply_markup: None,
        };
        let sent: SentMessage = self
            .post_json("sendMessage", &request)
            .await
            .map_err(BotError::Transport)?;
        Ok(sent.message_id)
    }

    async fn send_keyboard(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageId> {
        let markup = ReplyKeyboardMarkup {
            keyboard: keyboard
                .rows
                .iter()
                .map(|row| row.iter().map(|b| KeyboardButton { text: b }).collect())
                .collect(),
            resize_keyboard: true,
            one_time_keyboard: true,
        };
        let request = SendMessageRequest {
            chat_id: chat,
            text,
            reply_markup: Some(markup),
        };
        let sent: SentMessage = self
            .post_json("sendMessage", &request)
            .await
            .map_err(BotError::Transport)?;
        Ok(sent.message_id)
    }

    async fn send_photo(&self, chat: ChatId, photo: OutboundPhoto) -> Result<MessageId> {
        let (method, field) = match photo.mime_type.as_str() {
            "image/jpeg" | "image/png" => ("sendPhoto", "photo"),
            _ => ("sendDocument", "document"),
        };

        let part = Part::bytes(photo.bytes.to_vec())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.mime_type)
            .map_err(|e| BotError::DeliveryFailure(e.to_string()))?;
        let form = Form::new()
            .text("chat_id", chat.to_string())
            .text("caption", photo.caption.clone())
            .part(field, part);

        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                BotError::DeliveryFailure(self.request_failed(&format!("{} request", method), e))
            })?;
        let sent: SentMessage = Self::unwrap_response(method, response)
            .await
            .map_err(BotError::DeliveryFailure)?;

        tracing::debug!(chat, method, file = %photo.file_name, "Delivered result");
        Ok(sent.message_id)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        let request = DeleteMessageRequest {
            chat_id: chat,
            message_id: message,
        };
        let _: bool = self
            .post_json("deleteMessage", &request)
            .await
            .map_err(BotError::Transport)?;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str, destination: &Path) -> Result<u64> {
        match self.download(file_id, destination).await {
            Ok(size) => Ok(size),
            Err(reason) => {
                if let Err(e) = tokio::fs::remove_file(destination).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %destination.display(),
                            "Failed to remove partial download: {}",
                            e
                        );
                    }
                }
                Err(BotError::DownloadFailure(reason).into())
            }
        }
    }
}
