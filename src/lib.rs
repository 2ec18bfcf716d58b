//! Image Utility Bot library
//!
//! A conversational front end over a small image pipeline: users upload an
//! image, pick an operation (format conversion or background removal) and a
//! target resolution, and receive the processed file back.
//!
//! # Architecture
//!
//! - `imaging`: decoding, alpha handling, resizing, encoding, handlers
//! - `bot`: menus, per-conversation sessions, the state machine, the dispatcher
//! - `transport`: the chat service abstraction and its Telegram implementation
//! - `janitor`: cleanup of orphaned temp files
//! - `config`: configuration loading and validation
//! - `logging`: tracing subscriber setup
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//! - `commands`: handlers behind each CLI subcommand
//!
//! # Example
//!
//! ```no_run
//! use image_utility_bot::imaging::{Operation, OutputFormat, Pipeline, SizeOption};
//! use image_utility_bot::{CommandExtractor, Config};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! config.validate()?;
//!
//! let settings = config.processing.settings();
//! let extractor = CommandExtractor::new(
//!     config.background.program.clone(),
//!     config.background.args.clone(),
//!     settings.work_dir.clone(),
//! );
//! let pipeline = Pipeline::new(settings, Arc::new(extractor));
//! let result = pipeline.process_blocking(
//!     Operation::ConvertTo(OutputFormat::Png),
//!     Path::new("photo.jpg"),
//!     SizeOption::Medium,
//! )?;
//! println!("{}", result.caption());
//! # Ok(())
//! # }
//! ```

pub mod bot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod imaging;
pub mod janitor;
pub mod logging;
pub mod transport;

// Re-export commonly used types
pub use bot::{ConversationMachine, Dispatcher, SessionStore};
pub use config::Config;
pub use error::{BotError, ProcessingError, Result};
pub use imaging::{CommandExtractor, Operation, OutputFormat, Pipeline, SizeOption};
pub use transport::telegram::TelegramTransport;
pub use transport::Transport;

#[cfg(test)]
pub mod test_utils;
