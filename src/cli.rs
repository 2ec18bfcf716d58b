//! Command-line interface definition
//!
//! `run` starts the chat bot, `process` applies one operation to a local
//! file, and `sweep` cleans orphaned temp files from the working directory.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Image utility bot
///
/// Converts images between formats, resizes them to common resolutions and
/// removes backgrounds, driven by a chat conversation.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-utility-bot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the working directory for uploads and results
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect to the chat service and serve conversations
    Run,

    /// Process a single local image without the chat service
    Process {
        /// Source image
        #[arg(short, long)]
        input: PathBuf,

        /// Operation: png, jpg, webp, bmp, tiff or remove-background
        #[arg(long, default_value = "png")]
        operation: String,

        /// Target resolution: original, 720p, 1080p or 1440p
        #[arg(short, long, default_value = "original")]
        size: String,

        /// Where to write the result (default: processed.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete orphaned temp files from the working directory
    Sweep {
        /// Only delete files at least this old
        #[arg(long, default_value_t = 0)]
        older_than_seconds: u64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            work_dir: None,
            command: Commands::Run,
        }
    }
}
