/*!
Command handlers for the CLI

- `run`: serve chat conversations over the Telegram Bot API
- `process`: apply one operation to a local file
- `sweep`: delete orphaned temp files from the working directory
*/

use crate::config::Config;
use crate::error::Result;
use crate::imaging::{CommandExtractor, Pipeline};
use std::sync::Arc;

/// Build the processing pipeline described by `config`
///
/// Creates the working directory when it does not exist yet.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let settings = config.processing.settings();
    std::fs::create_dir_all(&settings.work_dir)?;

    let extractor = CommandExtractor::new(
        config.background.program.clone(),
        config.background.args.clone(),
        settings.work_dir.clone(),
    );
    Ok(Pipeline::new(settings, Arc::new(extractor)))
}

// Bot command handler
pub mod run {
    //! Long-running bot mode.
    //!
    //! Sweeps leftovers from a previous run, connects to the chat service and
    //! dispatches conversations until Ctrl-C.

    use super::*;
    use crate::bot::{ConversationMachine, Dispatcher, SessionStore};
    use crate::janitor::sweep_work_dir;
    use crate::transport::telegram::TelegramTransport;
    use crate::transport::Transport;
    use std::time::Duration;

    /// Start the bot
    ///
    /// # Errors
    ///
    /// Fails when the token is missing, the working directory cannot be
    /// created, or the HTTP client cannot be built. Polling errors are retried
    /// and never end the run.
    pub async fn run_bot(config: Config) -> Result<()> {
        let token = config.telegram_token()?;
        let pipeline = Arc::new(build_pipeline(&config)?);
        let work_dir = pipeline.settings().work_dir.clone();

        if config.session.sweep_on_startup {
            let report = sweep_work_dir(&work_dir, Duration::ZERO)?;
            if report.removed > 0 {
                tracing::info!(
                    removed = report.removed,
                    "Removed leftovers from a previous run"
                );
            }
        }

        let transport: Arc<dyn Transport> =
            Arc::new(TelegramTransport::new(&config.telegram, token)?);
        tracing::info!(?transport, work_dir = %work_dir.display(), "Bot starting");

        let machine = Arc::new(ConversationMachine::new(
            Arc::clone(&transport),
            pipeline,
            SessionStore::new(),
            work_dir,
        ));
        let dispatcher = Dispatcher::new(machine, config.session.idle_timeout());
        dispatcher.run(transport).await
    }
}

// Offline processing handler
pub mod process {
    //! One-shot processing of a local file, bypassing the chat service.

    use super::*;
    use crate::error::{BotError, MenuKind};
    use crate::imaging::{Dimensions, Operation, OutputFormat, SizeOption};
    use colored::Colorize;
    use std::path::{Path, PathBuf};

    /// What a finished job produced
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ProcessSummary {
        pub output: PathBuf,
        pub format: OutputFormat,
        pub dimensions: Dimensions,
        pub channels: u8,
        pub bytes: u64,
        pub label: String,
    }

    /// Default destination: `processed.<ext>` beside the input
    pub fn default_output(input: &Path, format: OutputFormat) -> PathBuf {
        input.with_file_name(format!("processed.{}", format.extension()))
    }

    fn same_file(a: &Path, b: &Path) -> bool {
        match (a.canonicalize(), b.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }

    /// Process `input` and write the result
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `input` - Source image
    /// * `operation` - Operation token, e.g. `webp` or `remove-background`
    /// * `size` - Size label, e.g. `1080p`
    /// * `output` - Destination; defaults to [`default_output`]
    ///
    /// # Errors
    ///
    /// Returns [`BotError::InvalidChoice`] for an unknown size,
    /// [`BotError::Config`] when the output would replace the input, and the
    /// pipeline's error for everything else.
    pub fn process_file(
        config: &Config,
        input: &Path,
        operation: &str,
        size: &str,
        output: Option<PathBuf>,
    ) -> Result<ProcessSummary> {
        let operation: Operation = operation.parse()?;
        let size = SizeOption::from_label(size).ok_or_else(|| BotError::InvalidChoice {
            menu: MenuKind::Size,
            token: size.to_string(),
        })?;

        let output = output.unwrap_or_else(|| default_output(input, operation.output_format()));
        if same_file(input, &output) {
            return Err(BotError::Config(format!(
                "Output {} would overwrite the input; pass --output",
                output.display()
            ))
            .into());
        }

        let pipeline = build_pipeline(config)?;
        let result = pipeline.process_blocking(operation, input, size)?;

        let bytes = std::fs::copy(result.path(), &output)?;
        let summary = ProcessSummary {
            output,
            format: result.format(),
            dimensions: result.dimensions(),
            channels: result.channels(),
            bytes,
            label: result.label().to_string(),
        };
        result.cleanup()?;

        tracing::info!(
            output = %summary.output.display(),
            format = %summary.format,
            dimensions = %summary.dimensions,
            "Processed file"
        );
        Ok(summary)
    }

    /// Print a one-line summary to stdout
    pub fn print_summary(summary: &ProcessSummary) {
        println!(
            "{} {} -> {} ({}, {} channels, {} bytes)",
            "✔".green().bold(),
            summary.label.bold(),
            summary.output.display().to_string().cyan(),
            summary.dimensions,
            summary.channels,
            summary.bytes
        );
    }

}

// Temp file cleanup handler
pub mod sweep {
    use super::*;
    use crate::janitor::{sweep_work_dir, SweepReport};
    use colored::Colorize;
    use std::time::Duration;

    /// Sweep the configured working directory
    pub fn run_sweep(config: &Config, older_than_seconds: u64) -> Result<SweepReport> {
        sweep_work_dir(
            &config.processing.work_dir,
            Duration::from_secs(older_than_seconds),
        )
    }

    pub fn print_report(report: &SweepReport) {
        let status = if report.failed == 0 {
            "✔".green().bold()
        } else {
            "!".yellow().bold()
        };
        println!(
            "{} Removed {} file(s), {} bytes; {} failed",
            status, report.removed, report.bytes, report.failed
        );
    }
}
