//! Image Utility Bot
//!
#![doc = "Image Utility Bot"]
#![doc = "Main entry point for the conversational image processing bot."]

use anyhow::Result;

use image_utility_bot::cli::{Cli, Commands};
use image_utility_bot::commands;
use image_utility_bot::config::Config;
use image_utility_bot::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Initialize tracing once the logging section is known
    init_logging(&config.logging, cli.verbose)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Run => {
            tracing::info!("Starting bot mode");
            commands::run::run_bot(config).await?;
            Ok(())
        }
        Commands::Process {
            input,
            operation,
            size,
            output,
        } => {
            tracing::debug!(input = %input.display(), %operation, %size, "Processing local file");
            let summary =
                commands::process::process_file(&config, &input, &operation, &size, output)?;
            commands::process::print_summary(&summary);
            Ok(())
        }
        Commands::Sweep { older_than_seconds } => {
            let report = commands::sweep::run_sweep(&config, older_than_seconds)?;
            commands::sweep::print_report(&report);
            Ok(())
        }
    }
}
