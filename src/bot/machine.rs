//! Conversation state machine
//!
//! ```text
//! AwaitingUpload --image--> AwaitingOperationChoice --op--> AwaitingSizeChoice
//!       ^                                                          |
//!       +----------------- deliver or report, clean up ------------+
//! ```
//!
//! Every failure is turned into user-facing text exactly once, here. Temp
//! files and session state are cleaned up on every exit path, and transport
//! errors while notifying are logged without changing state.

use super::menu::{
    self, CANCELLED, NOTHING_TO_CANCEL, OPERATION_PROMPT, PROGRESS_NOTICE, SIZE_PROMPT,
    UNKNOWN_COMMAND, UPLOAD_HINT,
};
use super::session::{ConversationSession, ConversationState, SessionStore};
use crate::error::BotError;
use crate::imaging::{Operation, OutputFormat, Pipeline, SizeOption};
use crate::transport::{
    ChatId, ImageSource, InboundEvent, IncomingImage, Keyboard, MessageId, OutboundPhoto,
    Transport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Check an upload's declared type before fetching it
///
/// Native photos are trusted. Documents must declare `image/*` with a
/// supported subtype.
///
/// # Errors
///
/// Returns [`BotError::UnsupportedInputType`] carrying the declared type.
pub fn validate_upload(image: &IncomingImage) -> Result<(), BotError> {
    if image.source == ImageSource::Photo {
        return Ok(());
    }

    let declared = image
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if !declared.starts_with("image/") || OutputFormat::from_mime(&declared).is_none() {
        let declared = if declared.is_empty() {
            "unknown".to_string()
        } else {
            declared
        };
        return Err(BotError::UnsupportedInputType(declared));
    }

    Ok(())
}

/// Recover the typed error from a transport failure, defaulting to `fallback`
fn boundary_error(error: anyhow::Error, fallback: fn(String) -> BotError) -> BotError {
    match error.downcast::<BotError>() {
        Ok(typed) => typed,
        Err(other) => fallback(format!("{:#}", other)),
    }
}

async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to remove temp file: {}", e),
    }
}

/// Drives one conversation step at a time
pub struct ConversationMachine {
    transport: Arc<dyn Transport>,
    pipeline: Arc<Pipeline>,
    sessions: SessionStore,
    work_dir: PathBuf,
}

impl ConversationMachine {
    pub fn new(
        transport: Arc<dyn Transport>,
        pipeline: Arc<Pipeline>,
        sessions: SessionStore,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            pipeline,
            sessions,
            work_dir: work_dir.into(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Handle one inbound event and return the resulting state
    pub async fn handle(&self, chat: ChatId, event: InboundEvent) -> ConversationState {
        match event {
            InboundEvent::Command(command) => self.on_command(chat, &command).await,
            InboundEvent::Image(image) => self.on_image(chat, image).await,
            InboundEvent::Text(text) => self.on_text(chat, &text).await,
        }
        self.sessions.state(chat).await
    }

    /// Drop the session for `chat` and delete its upload
    ///
    /// Returns `true` when there was a session to drop.
    pub async fn abandon(&self, chat: ChatId) -> bool {
        match self.sessions.clear(chat).await {
            Some(session) => {
                remove_file_quietly(&session.source_file).await;
                true
            }
            None => false,
        }
    }

    async fn on_command(&self, chat: ChatId, command: &str) {
        tracing::debug!(chat, command, "Command received");
        match command {
            "start" => self.notify(chat, &menu::welcome_message()).await,
            "help" => self.notify(chat, &menu::help_message()).await,
            "cancel" => {
                let reply = if self.abandon(chat).await {
                    CANCELLED
                } else {
                    NOTHING_TO_CANCEL
                };
                self.notify(chat, reply).await;
            }
            _ => self.notify(chat, UNKNOWN_COMMAND).await,
        }
    }

    async fn on_image(&self, chat: ChatId, image: IncomingImage) {
        if self.abandon(chat).await {
            tracing::info!(chat, "Replacing pending upload");
        }

        if let Err(e) = validate_upload(&image) {
            tracing::info!(chat, "Rejected upload: {}", e);
            self.notify(chat, &e.user_message()).await;
            return;
        }

        let notice = self.send_notice(chat).await;
        let received = self.receive_upload(&image).await;
        if let Some(message) = notice {
            if let Err(e) = self.transport.delete_message(chat, message).await {
                tracing::warn!(chat, "Failed to delete progress notice: {:#}", e);
            }
        }

        match received {
            Ok(path) => {
                tracing::info!(chat, path = %path.display(), "Upload stored");
                self.sessions
                    .put(chat, ConversationSession::new(path))
                    .await;
                self.prompt(chat, OPERATION_PROMPT, &menu::operation_keyboard())
                    .await;
            }
            Err(e) => {
                tracing::error!(chat, "Upload failed: {}", e);
                self.notify(chat, &e.user_message()).await;
            }
        }
    }

    async fn on_text(&self, chat: ChatId, text: &str) {
        let Some(mut session) = self.sessions.get(chat).await else {
            self.notify(chat, UPLOAD_HINT).await;
            return;
        };

        match session.operation {
            None => match menu::parse_operation(text) {
                Ok(operation) => {
                    tracing::debug!(chat, %operation, "Operation chosen");
                    session.operation = Some(operation);
                    self.sessions.put(chat, session).await;
                    self.prompt(chat, SIZE_PROMPT, &menu::size_keyboard()).await;
                }
                Err(e) => self.notify(chat, &e.user_message()).await,
            },
            Some(operation) => match menu::parse_size(text) {
                Ok(size) => self.execute(chat, session, operation, size).await,
                Err(e) => self.notify(chat, &e.user_message()).await,
            },
        }
    }

    /// Run the pipeline, deliver or report, then reset the conversation
    async fn execute(
        &self,
        chat: ChatId,
        session: ConversationSession,
        operation: Operation,
        size: SizeOption,
    ) {
        tracing::info!(chat, %operation, %size, "Processing image");

        match self
            .pipeline
            .process(operation, session.source_file.clone(), size)
            .await
        {
            Ok(result) => {
                let photo = OutboundPhoto {
                    bytes: result.bytes(),
                    file_name: result.file_name(),
                    caption: result.caption(),
                    mime_type: result.format().mime_type().to_string(),
                };

                match self.transport.send_photo(chat, photo).await {
                    Ok(_) => tracing::info!(
                        chat,
                        %operation,
                        dimensions = %result.dimensions(),
                        channels = result.channels(),
                        "Result delivered"
                    ),
                    Err(e) => {
                        let error = boundary_error(e, BotError::DeliveryFailure);
                        tracing::error!(chat, "Delivery failed: {}", error);
                        self.notify(chat, &error.user_message()).await;
                    }
                }

                let staged = result.path().to_path_buf();
                if let Err(e) = result.cleanup() {
                    tracing::warn!(path = %staged.display(), "Failed to remove output file: {}", e);
                }
            }
            Err(e) => {
                tracing::error!(chat, %operation, "Processing failed: {}", e);
                self.notify(chat, &operation.failure_message(&e)).await;
            }
        }

        self.sessions.clear(chat).await;
        remove_file_quietly(&session.source_file).await;
    }

    async fn receive_upload(&self, image: &IncomingImage) -> Result<PathBuf, BotError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self
            .work_dir
            .join(format!("upload-{}.{}", Uuid::new_v4(), image.extension()));

        match self.transport.fetch_file(&image.file_id, &path).await {
            Ok(size) => {
                tracing::debug!(file_id = %image.file_id, bytes = size, "Fetched upload");
                Ok(path)
            }
            Err(e) => {
                remove_file_quietly(&path).await;
                Err(boundary_error(e, BotError::DownloadFailure))
            }
        }
    }

    async fn send_notice(&self, chat: ChatId) -> Option<MessageId> {
        match self.transport.send_text(chat, PROGRESS_NOTICE).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(chat, "Failed to send progress notice: {:#}", e);
                None
            }
        }
    }

    async fn notify(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.transport.send_text(chat, text).await {
            tracing::warn!(chat, "Failed to send message: {:#}", e);
        }
    }

    async fn prompt(&self, chat: ChatId, text: &str, keyboard: &Keyboard) {
        if let Err(e) = self.transport.send_keyboard(chat, text, keyboard).await {
            tracing::warn!(chat, "Failed to send prompt: {:#}", e);
        }
    }
}
