//! Configuration management
//!
//! Configuration is read from a YAML file (defaults when the file is
//! missing), then overridden by `IMAGE_BOT_*` environment variables and CLI
//! flags. The bot token itself never lives in the file; it is read from the
//! environment variable named by `telegram.token_env`.

use crate::error::{BotError, Result};
use crate::imaging::background::{INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use crate::imaging::{
    AlphaPolicy, EncodeSettings, FlattenStrategy, PngCompression, ProcessingSettings,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chat service connection
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Encoding and job settings
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Background removal command
    #[serde(default)]
    pub background: BackgroundConfig,
    /// Conversation lifetime
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telegram Bot API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// API base URL (overridable for tests and local Bot API servers)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Long-poll wait passed to `getUpdates` (seconds)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,

    /// Timeout for every other request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Environment variable holding the bot token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30
}

fn default_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_timeout_seconds: default_poll_timeout(),
            request_timeout_seconds: default_request_timeout(),
            token_env: default_token_env(),
        }
    }
}

/// Image processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Directory for uploads and staged results
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default)]
    pub png_compression: PngCompression,

    /// JPEG quality, 1-100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// How alpha is removed for formats without it: `drop` or `composite`
    #[serde(default)]
    pub alpha_flatten: FlattenStrategy,

    /// Matte color for `composite`, as `[r, g, b]`
    #[serde(default = "default_matte_color")]
    pub matte_color: [u8; 3],

    /// Jobs allowed on the blocking pool at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_matte_color() -> [u8; 3] {
    [255, 255, 255]
}

fn default_max_concurrent_jobs() -> usize {
    2
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            png_compression: PngCompression::default(),
            jpeg_quality: default_jpeg_quality(),
            alpha_flatten: FlattenStrategy::default(),
            matte_color: default_matte_color(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl ProcessingConfig {
    /// Settings handed to the processing pipeline
    pub fn settings(&self) -> ProcessingSettings {
        ProcessingSettings {
            work_dir: self.work_dir.clone(),
            encode: EncodeSettings {
                png_compression: self.png_compression,
                jpeg_quality: self.jpeg_quality,
            },
            alpha_policy: AlphaPolicy {
                strategy: self.alpha_flatten,
                matte: self.matte_color,
            },
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }
}

/// External foreground extraction command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Program to run
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments, with `{input}` and `{output}` placeholders
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "rembg".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "i".to_string(),
        INPUT_PLACEHOLDER.to_string(),
        OUTPUT_PLACEHOLDER.to_string(),
    ]
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

/// Conversation lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a pending upload is discarded (seconds)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,

    /// Remove orphaned temp files when the bot starts
    #[serde(default = "default_sweep_on_startup")]
    pub sweep_on_startup: bool,
}

fn default_idle_timeout() -> u64 {
    1800
}

fn default_sweep_on_startup() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
            sweep_on_startup: default_sweep_on_startup(),
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

/// Logging output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Also append logs to this file
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, apply: impl FnOnce(T)) {
    if let Ok(raw) = std::env::var(name) {
        match raw.trim().parse() {
            Ok(value) => apply(value),
            Err(_) => tracing::warn!("Invalid {}: {}", name, raw),
        }
    }
}

fn parse_env_yaml<T: serde::de::DeserializeOwned>(name: &str, apply: impl FnOnce(T)) {
    if let Ok(raw) = std::env::var(name) {
        match serde_yaml::from_str(raw.trim()) {
            Ok(value) => apply(value),
            Err(_) => tracing::warn!("Invalid {}: {}", name, raw),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| BotError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_base) = std::env::var("IMAGE_BOT_API_BASE") {
            self.telegram.api_base = api_base;
        }
        parse_env("IMAGE_BOT_POLL_TIMEOUT_SECONDS", |v| {
            self.telegram.poll_timeout_seconds = v
        });

        if let Ok(work_dir) = std::env::var("IMAGE_BOT_WORK_DIR") {
            self.processing.work_dir = PathBuf::from(work_dir);
        }
        parse_env("IMAGE_BOT_JPEG_QUALITY", |v| {
            self.processing.jpeg_quality = v
        });
        parse_env("IMAGE_BOT_MAX_CONCURRENT_JOBS", |v| {
            self.processing.max_concurrent_jobs = v
        });
        parse_env_yaml("IMAGE_BOT_PNG_COMPRESSION", |v| {
            self.processing.png_compression = v
        });
        parse_env_yaml("IMAGE_BOT_ALPHA_FLATTEN", |v| {
            self.processing.alpha_flatten = v
        });

        if let Ok(program) = std::env::var("IMAGE_BOT_REMBG_PROGRAM") {
            self.background.program = program;
        }

        parse_env("IMAGE_BOT_IDLE_TIMEOUT_SECONDS", |v| {
            self.session.idle_timeout_seconds = v
        });

        if let Ok(level) = std::env::var("IMAGE_BOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        parse_env("IMAGE_BOT_LOG_JSON", |v| self.logging.json_format = v);
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(work_dir) = &cli.work_dir {
            self.processing.work_dir = work_dir.clone();
        }
    }

    /// Read the bot token from the configured environment variable
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] when the variable is unset or blank.
    pub fn telegram_token(&self) -> Result<String> {
        match std::env::var(&self.telegram.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(BotError::Config(format!(
                "No {} found in environment variables",
                self.telegram.token_env
            ))
            .into()),
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let api_base = url::Url::parse(&self.telegram.api_base).map_err(|e| {
            BotError::Config(format!(
                "telegram.api_base is not a valid URL ({}): {}",
                self.telegram.api_base, e
            ))
        })?;
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(BotError::Config(format!(
                "telegram.api_base must use http or https, got {}",
                api_base.scheme()
            ))
            .into());
        }

        if self.telegram.request_timeout_seconds == 0 {
            return Err(BotError::Config(
                "telegram.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.telegram.token_env.trim().is_empty() {
            return Err(
                BotError::Config("telegram.token_env cannot be empty".to_string()).into(),
            );
        }

        if self.processing.work_dir.as_os_str().is_empty() {
            return Err(
                BotError::Config("processing.work_dir cannot be empty".to_string()).into(),
            );
        }

        if !(1..=100).contains(&self.processing.jpeg_quality) {
            return Err(BotError::Config(
                "processing.jpeg_quality must be between 1 and 100".to_string(),
            )
            .into());
        }

        if !(1..=64).contains(&self.processing.max_concurrent_jobs) {
            return Err(BotError::Config(
                "processing.max_concurrent_jobs must be between 1 and 64".to_string(),
            )
            .into());
        }

        if self.background.program.trim().is_empty() {
            return Err(
                BotError::Config("background.program cannot be empty".to_string()).into(),
            );
        }

        for placeholder in [INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER] {
            if !self.background.args.iter().any(|a| a.contains(placeholder)) {
                return Err(BotError::Config(format!(
                    "background.args must contain the {} placeholder",
                    placeholder
                ))
                .into());
            }
        }

        if self.session.idle_timeout_seconds == 0 {
            return Err(BotError::Config(
                "session.idle_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.logging.level.trim().is_empty() {
            return Err(BotError::Config("logging.level cannot be empty".to_string()).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_config_error, temp_dir};
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.processing.work_dir, PathBuf::from("downloads"));
        assert_eq!(config.processing.jpeg_quality, 95);
        assert_eq!(config.processing.alpha_flatten, FlattenStrategy::Composite);
        assert_eq!(config.background.program, "rembg");
        assert_eq!(config.background.args, vec!["i", "{input}", "{output}"]);
        assert_eq!(config.session.idle_timeout_seconds, 1800);
        assert!(config.session.sweep_on_startup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
processing:
  jpeg_quality: 80
  alpha_flatten: drop
  matte_color: [0, 0, 0]
  png_compression: best
session:
  idle_timeout_seconds: 60
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.processing.jpeg_quality, 80);
        assert_eq!(config.processing.work_dir, PathBuf::from("downloads"));
        assert_eq!(config.session.idle_timeout_seconds, 60);
        assert!(config.session.sweep_on_startup);

        let settings = config.processing.settings();
        assert_eq!(
            settings.alpha_policy,
            AlphaPolicy {
                strategy: FlattenStrategy::Drop,
                matte: [0, 0, 0],
            }
        );
        assert_eq!(settings.encode.png_compression, PngCompression::Best);
        assert_eq!(settings.encode.jpeg_quality, 80);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.processing.jpeg_quality = 0;
        assert_config_error(config.validate(), "jpeg_quality");

        let mut config = Config::default();
        config.processing.max_concurrent_jobs = 0;
        assert_config_error(config.validate(), "max_concurrent_jobs");

        let mut config = Config::default();
        config.telegram.api_base = "not a url".to_string();
        assert_config_error(config.validate(), "api_base");

        let mut config = Config::default();
        config.telegram.api_base = "ftp://example.com".to_string();
        assert_config_error(config.validate(), "http or https");

        let mut config = Config::default();
        config.background.args = vec!["{input}".to_string()];
        assert_config_error(config.validate(), "{output}");

        let mut config = Config::default();
        config.session.idle_timeout_seconds = 0;
        assert_config_error(config.validate(), "idle_timeout_seconds");
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let dir = temp_dir();
        let path = dir.path().join("absent.yaml");
        let config = Config::load(path.to_str().unwrap(), &crate::cli::Cli::default()).unwrap();
        assert_eq!(config.processing.jpeg_quality, 95);
    }

    #[test]
    #[serial]
    fn test_load_invalid_yaml_is_config_error() {
        let dir = temp_dir();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "processing: [unclosed").unwrap();

        let result = Config::load(path.to_str().unwrap(), &crate::cli::Cli::default());
        assert_config_error(result.map(|_| ()), "Failed to parse config");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("IMAGE_BOT_JPEG_QUALITY", "70");
        std::env::set_var("IMAGE_BOT_ALPHA_FLATTEN", "drop");
        std::env::set_var("IMAGE_BOT_IDLE_TIMEOUT_SECONDS", "not-a-number");
        std::env::set_var("IMAGE_BOT_WORK_DIR", "/var/tmp/bot");

        let mut config = Config::default();
        config.apply_env_vars();

        std::env::remove_var("IMAGE_BOT_JPEG_QUALITY");
        std::env::remove_var("IMAGE_BOT_ALPHA_FLATTEN");
        std::env::remove_var("IMAGE_BOT_IDLE_TIMEOUT_SECONDS");
        std::env::remove_var("IMAGE_BOT_WORK_DIR");

        assert_eq!(config.processing.jpeg_quality, 70);
        assert_eq!(config.processing.alpha_flatten, FlattenStrategy::Drop);
        assert_eq!(config.session.idle_timeout_seconds, 1800);
        assert_eq!(config.processing.work_dir, PathBuf::from("/var/tmp/bot"));
    }

    #[test]
    #[serial]
    fn test_cli_work_dir_wins_over_env() {
        std::env::set_var("IMAGE_BOT_WORK_DIR", "/from/env");
        let cli = crate::cli::Cli {
            work_dir: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };
        let dir = temp_dir();
        let config = Config::load(dir.path().join("none.yaml").to_str().unwrap(), &cli).unwrap();
        std::env::remove_var("IMAGE_BOT_WORK_DIR");

        assert_eq!(config.processing.work_dir, PathBuf::from("/from/cli"));
    }

    #[test]
    #[serial]
    fn test_telegram_token_from_env() {
        let mut config = Config::default();
        config.telegram.token_env = "IMAGE_BOT_TEST_TOKEN".to_string();

        std::env::remove_var("IMAGE_BOT_TEST_TOKEN");
        assert_config_error(config.telegram_token().map(|_| ()), "IMAGE_BOT_TEST_TOKEN");

        std::env::set_var("IMAGE_BOT_TEST_TOKEN", "  123:abc ");
        assert_eq!(config.telegram_token().unwrap(), "123:abc");
        std::env::remove_var("IMAGE_BOT_TEST_TOKEN");
    }
}
