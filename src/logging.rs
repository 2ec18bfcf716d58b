//! Structured logging setup
//!
//! Human-readable or JSON output on stdout, optionally mirrored to a file.
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGET: &str = "image_utility_bot";

/// Filter directive used when `RUST_LOG` is unset
///
/// A bare level such as `info` is scoped to this crate so dependency noise
/// stays out; anything containing `=` or `,` is passed through untouched.
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        return format!("{}=debug", CRATE_TARGET);
    }
    let level = config.level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("{}={}", CRATE_TARGET, level)
    }
}

/// Initialize the global tracing subscriber
///
/// # Arguments
///
/// * `config` - Logging configuration
/// * `verbose` - Force debug output for this crate
///
/// # Errors
///
/// Fails when the filter cannot be parsed, the log file cannot be opened, or
/// a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use image_utility_bot::config::LoggingConfig;
/// use image_utility_bot::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     json_format: true,
///     file_path: None,
/// };
/// init_logging(&config, false).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config, verbose)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    if config.json_format {
        let stdout_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);

        if let Some(file) = file {
            let file_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(file);
            registry.with(stdout_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stdout_layer).try_init()?;
        }
    } else {
        let stdout_layer = fmt::layer().with_target(true).with_level(true);

        if let Some(file) = file {
            let file_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(file);
            registry.with(stdout_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stdout_layer).try_init()?;
        }
    }

    Ok(())
}
