//! Processing pipeline
//!
//! A single contract turns a source file on disk into sized, correctly
//! channeled output bytes plus metadata. Each [`Operation`] maps to an
//! [`ImageHandler`] through [`Pipeline::handler_for`]; the async entry point
//! runs handlers on the blocking pool under a concurrency limit so a slow
//! decode or extraction never stalls other conversations.

use super::artifact::AlphaPolicy;
use super::background::{BackgroundRemover, ForegroundExtractor};
use super::converter::FormatConverter;
use super::format::{EncodeSettings, OutputFormat};
use super::size::{Dimensions, SizeOption};
use crate::error::ProcessingError;
use bytes::Bytes;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempPath;
use tokio::sync::Semaphore;

/// What to do with an uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Re-encode into the given format
    ConvertTo(OutputFormat),
    /// Cut the foreground out; always PNG
    RemoveBackground,
}

impl Operation {
    /// Format the result is delivered in
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Self::ConvertTo(format) => *format,
            Self::RemoveBackground => OutputFormat::Png,
        }
    }

    /// Human-readable label used in the success caption
    ///
    /// # Examples
    ///
    /// ```
    /// use image_utility_bot::imaging::{Operation, OutputFormat};
    ///
    /// assert_eq!(Operation::ConvertTo(OutputFormat::Jpeg).label(), "Conversion to JPG");
    /// assert_eq!(Operation::RemoveBackground.label(), "Background removal");
    /// ```
    pub fn label(&self) -> String {
        match self {
            Self::ConvertTo(format) => format!("Conversion to {}", format.label()),
            Self::RemoveBackground => "Background removal".to_string(),
        }
    }

    /// Prefix used when reporting a failure of this operation to the user
    pub fn error_prefix(&self) -> &'static str {
        match self {
            Self::ConvertTo(_) => "Conversion",
            Self::RemoveBackground => "Background Removal",
        }
    }

    /// Render a processing failure the way the chat shows it
    pub fn failure_message(&self, error: &ProcessingError) -> String {
        format!("🔴 {} Error: {}", self.error_prefix(), error)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConvertTo(format) => write!(f, "convert-to-{}", format.extension()),
            Self::RemoveBackground => f.write_str("remove-background"),
        }
    }
}

impl FromStr for Operation {
    type Err = ProcessingError;

    /// Accepts a format name (`png`, `jpg`, ...), `convert-to-<format>` or
    /// `remove-background`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        match token.as_str() {
            "remove-background" | "remove_background" | "rembg" => Ok(Self::RemoveBackground),
            other => {
                let format = other.strip_prefix("convert-to-").unwrap_or(other);
                format.parse().map(Self::ConvertTo)
            }
        }
    }
}

/// Settings shared by every handler
#[derive(Debug, Clone)]
pub struct ProcessingSettings {
    /// Directory for staged output files
    pub work_dir: PathBuf,
    pub encode: EncodeSettings,
    pub alpha_policy: AlphaPolicy,
    /// Upper bound on jobs running at once on the blocking pool
    pub max_concurrent_jobs: usize,
}

impl ProcessingSettings {
    /// Defaults rooted at `work_dir`
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            encode: EncodeSettings::default(),
            alpha_policy: AlphaPolicy::default(),
            max_concurrent_jobs: 2,
        }
    }
}

/// The outcome of a successful operation
///
/// Owns a temp file holding the encoded bytes. Call [`ProcessingResult::cleanup`]
/// once delivery is done; dropping the value removes the file as well.
#[derive(Debug)]
pub struct ProcessingResult {
    bytes: Bytes,
    format: OutputFormat,
    dimensions: Dimensions,
    channels: u8,
    label: String,
    temp: TempPath,
}

impl ProcessingResult {
    /// Write `bytes` to a fresh `output-*.ext` file in `work_dir`
    pub(crate) fn stage(
        work_dir: &Path,
        bytes: Vec<u8>,
        format: OutputFormat,
        dimensions: Dimensions,
        channels: u8,
        label: String,
    ) -> Result<Self, ProcessingError> {
        let suffix = format!(".{}", format.extension());
        let mut file = tempfile::Builder::new()
            .prefix("output-")
            .suffix(&suffix)
            .tempfile_in(work_dir)?;
        file.write_all(&bytes)?;
        file.flush()?;

        Ok(Self {
            bytes: Bytes::from(bytes),
            format,
            dimensions,
            channels,
            label,
            temp: file.into_temp_path(),
        })
    }

    /// Encoded output
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Path of the staged output file
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// File name presented to the user (`processed.<ext>`)
    pub fn file_name(&self) -> String {
        format!("processed.{}", self.format.extension())
    }

    /// Success caption, e.g. "✅ Conversion to PNG completed successfully!\nResolution: 1620x1080"
    pub fn caption(&self) -> String {
        format!(
            "✅ {} completed successfully!\nResolution: {}",
            self.label, self.dimensions
        )
    }

    /// Delete the staged output file
    pub fn cleanup(self) -> io::Result<()> {
        self.temp.close()
    }
}

/// One processing variant
pub trait ImageHandler: Send + Sync {
    /// Process the image at `source` into a staged result
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessingError`] describing the failed stage; no output
    /// file is left behind on error.
    fn process(
        &self,
        source: &Path,
        size: SizeOption,
    ) -> Result<ProcessingResult, ProcessingError>;
}

/// Dispatches operations to handlers and bounds concurrent work
pub struct Pipeline {
    settings: ProcessingSettings,
    extractor: Arc<dyn ForegroundExtractor>,
    permits: Arc<Semaphore>,
}

impl Pipeline {
    /// Create a pipeline using `extractor` for background removal
    pub fn new(settings: ProcessingSettings, extractor: Arc<dyn ForegroundExtractor>) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        Self {
            settings,
            extractor,
            permits,
        }
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    /// Build the handler for `operation`
    pub fn handler_for(&self, operation: Operation) -> Box<dyn ImageHandler> {
        match operation {
            Operation::ConvertTo(format) => {
                Box::new(FormatConverter::new(format, self.settings.clone()))
            }
            Operation::RemoveBackground => Box::new(BackgroundRemover::new(
                Arc::clone(&self.extractor),
                self.settings.clone(),
            )),
        }
    }

    /// Run `operation` on the current thread
    pub fn process_blocking(
        &self,
        operation: Operation,
        source: &Path,
        size: SizeOption,
    ) -> Result<ProcessingResult, ProcessingError> {
        self.handler_for(operation).process(source, size)
    }

    /// Run `operation` on the blocking pool once a job permit is free
    ///
    /// # Errors
    ///
    /// Handler errors are returned as-is. A panicked or cancelled task, or a
    /// closed semaphore, becomes [`ProcessingError::TaskAborted`].
    pub async fn process(
        &self,
        operation: Operation,
        source: PathBuf,
        size: SizeOption,
    ) -> Result<ProcessingResult, ProcessingError> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ProcessingError::TaskAborted(e.to_string()))?;

        let handler = self.handler_for(operation);
        tracing::debug!(%operation, %size, source = %source.display(), "Dispatching job");

        tokio::task::spawn_blocking(move || handler.process(&source, size))
            .await
            .map_err(|e| ProcessingError::TaskAborted(e.to_string()))?
    }
}
