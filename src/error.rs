//! Error types for the image utility bot
//!
//! Two layers of errors are defined here:
//!
//! - [`ProcessingError`] is returned by the imaging pipeline (decode, extract,
//!   resize, encode). It never touches the chat transport.
//! - [`BotError`] is the conversation-boundary taxonomy. Every failure that
//!   reaches the state machine is turned into a `BotError` and rendered to the
//!   user exactly once via [`BotError::user_message`].

use thiserror::Error;

/// Errors produced while turning a source file into an output artifact
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Source bytes could not be read or decoded as an image
    #[error("Failed to read image file: {0}")]
    DecodeFailure(String),

    /// The foreground extractor failed or the source was unreadable
    #[error("Background extraction failed: {0}")]
    ExtractionFailure(String),

    /// The output could not be encoded or written
    #[error("Failed to encode {format} output: {message}")]
    EncodeFailure {
        /// Target format label (e.g. "PNG")
        format: String,
        /// Encoder diagnostic
        message: String,
    },

    /// The requested output format is not in the supported set
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// The blocking processing task panicked or was cancelled
    #[error("Processing task aborted: {0}")]
    TaskAborted(String),

    /// IO errors while staging temporary files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which menu an invalid choice was made against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    /// Operation menu (convert / remove background)
    Operation,
    /// Resolution menu (size catalog)
    Size,
}

/// Main error type for conversation handling
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level errors (polling, API responses)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The uploaded file could not be materialized locally
    #[error("Failed to download file: {0}")]
    DownloadFailure(String),

    /// The upload declared a content type that is not a supported image
    #[error("Unsupported input type: {0}")]
    UnsupportedInputType(String),

    /// User input does not match the active menu
    #[error("Invalid {menu:?} choice: {token}")]
    InvalidChoice {
        /// Menu the token was checked against
        menu: MenuKind,
        /// Raw user input
        token: String,
    },

    /// The processed result could not be sent back
    #[error("Failed to send processed image: {0}")]
    DeliveryFailure(String),

    /// Pipeline failure
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BotError {
    /// Render the message shown to the chat user for this failure
    ///
    /// Processing failures are prefixed by the caller with the operation
    /// name, so this only covers the boundary variants verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use image_utility_bot::error::{BotError, MenuKind};
    ///
    /// let err = BotError::InvalidChoice { menu: MenuKind::Size, token: "4k".into() };
    /// assert!(err.user_message().contains("Invalid size choice"));
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedInputType(declared) => match declared.strip_prefix("image/") {
                Some(subtype) => format!("❌ Unsupported format: {}", subtype),
                None => "❌ Please upload an image file (JPEG, PNG, WEBP, etc.)".to_string(),
            },
            Self::InvalidChoice {
                menu: MenuKind::Operation,
                ..
            } => "❌ Invalid choice. Please select a number from the keyboard.".to_string(),
            Self::InvalidChoice {
                menu: MenuKind::Size,
                ..
            } => "❌ Invalid size choice. Please select from the keyboard options.".to_string(),
            Self::DownloadFailure(_) => "❌ Error: Failed to download file".to_string(),
            Self::DeliveryFailure(_) => {
                "❌ Processing Error: Failed to send processed image".to_string()
            }
            Self::Processing(e) => format!("❌ Processing Error: {}", e),
            other => format!("❌ Error: {}", other),
        }
    }
}

/// Result type alias for application plumbing
///
/// Uses `anyhow::Error` so configuration, CLI and transport code can attach
/// context freely; typed errors above are recovered with `downcast_ref`
/// where the distinction matters.
pub type Result<T> = anyhow::Result<T>;
