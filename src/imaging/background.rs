//! Background removal
//!
//! The segmentation model itself is opaque: anything implementing
//! [`ForegroundExtractor`] can cut the subject out. [`CommandExtractor`]
//! delegates to an external program such as `rembg`, passing the image
//! through two temp files in the working directory.
//!
//! Output from [`BackgroundRemover`] is always a 4-channel PNG.

use super::artifact::ImageArtifact;
use super::converter::decode_source;
use super::format::{encode, OutputFormat};
use super::pipeline::{ImageHandler, Operation, ProcessingResult, ProcessingSettings};
use super::resize::resize_to_fit;
use super::size::SizeOption;
use crate::error::ProcessingError;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Placeholder replaced by the input file path in command arguments
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the output file path in command arguments
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Separates the foreground subject from its background
#[cfg_attr(test, mockall::automock)]
pub trait ForegroundExtractor: Send + Sync {
    /// Return the image with background pixels made transparent
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::ExtractionFailure`] when the model cannot
    /// produce a result.
    fn extract(&self, image: &DynamicImage) -> Result<RgbaImage, ProcessingError>;
}

/// Runs an external program to do the extraction
///
/// `args` may contain [`INPUT_PLACEHOLDER`] and [`OUTPUT_PLACEHOLDER`]; the
/// default invocation is `rembg i {input} {output}`.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandExtractor {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            work_dir: work_dir.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

fn extraction_failure(e: impl std::fmt::Display) -> ProcessingError {
    ProcessingError::ExtractionFailure(e.to_string())
}

impl ForegroundExtractor for CommandExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<RgbaImage, ProcessingError> {
        // Both temp paths are removed on drop, whatever the outcome
        let input = tempfile::Builder::new()
            .prefix("extract-in-")
            .suffix(".png")
            .tempfile_in(&self.work_dir)
            .map_err(extraction_failure)?
            .into_temp_path();
        let output = tempfile::Builder::new()
            .prefix("extract-out-")
            .suffix(".png")
            .tempfile_in(&self.work_dir)
            .map_err(extraction_failure)?
            .into_temp_path();

        image
            .save_with_format(&input, ImageFormat::Png)
            .map_err(extraction_failure)?;

        let args = self.render_args(&input, &output);
        tracing::debug!(program = %self.program, ?args, "Running foreground extractor");

        let result = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| {
                ProcessingError::ExtractionFailure(format!(
                    "failed to launch {}: {}",
                    self.program, e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ProcessingError::ExtractionFailure(format!(
                "{} exited with status {}: {}",
                self.program,
                result.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let extracted = image::open(&output).map_err(|e| {
            ProcessingError::ExtractionFailure(format!("unreadable extractor output: {}", e))
        })?;

        Ok(extracted.to_rgba8())
    }
}

/// Handler that removes the background and emits PNG
pub struct BackgroundRemover {
    extractor: Arc<dyn ForegroundExtractor>,
    settings: ProcessingSettings,
}

impl BackgroundRemover {
    pub fn new(extractor: Arc<dyn ForegroundExtractor>, settings: ProcessingSettings) -> Self {
        Self {
            extractor,
            settings,
        }
    }
}

impl ImageHandler for BackgroundRemover {
    fn process(
        &self,
        source: &Path,
        size: SizeOption,
    ) -> Result<ProcessingResult, ProcessingError> {
        let decoded = decode_source(source).map_err(|e| match e {
            ProcessingError::DecodeFailure(reason) => ProcessingError::ExtractionFailure(reason),
            other => other,
        })?;

        let foreground = self.extractor.extract(&decoded)?;
        let artifact = resize_to_fit(ImageArtifact::Rgba(foreground), size);
        let bytes = encode(&artifact, OutputFormat::Png, &self.settings.encode)?;

        tracing::debug!(
            dimensions = %artifact.dimensions(),
            bytes = bytes.len(),
            "Removed background"
        );

        ProcessingResult::stage(
            &self.settings.work_dir,
            bytes,
            OutputFormat::Png,
            artifact.dimensions(),
            artifact.channels(),
            Operation::RemoveBackground.label(),
        )
    }
}
