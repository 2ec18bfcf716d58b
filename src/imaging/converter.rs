//! Format converter: decode, normalize channels, resize, encode

use super::artifact::ImageArtifact;
use super::format::{encode, OutputFormat};
use super::pipeline::{ImageHandler, Operation, ProcessingResult, ProcessingSettings};
use super::resize::resize_to_fit;
use super::size::SizeOption;
use crate::error::ProcessingError;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Decode the file at `path`, sniffing the format from its contents
///
/// Empty, truncated or non-image files all surface as
/// [`ProcessingError::DecodeFailure`].
pub(crate) fn decode_source(path: &Path) -> Result<DynamicImage, ProcessingError> {
    ImageReader::open(path)
        .map_err(|e| ProcessingError::DecodeFailure(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| ProcessingError::DecodeFailure(e.to_string()))?
        .decode()
        .map_err(|e| ProcessingError::DecodeFailure(e.to_string()))
}

/// Converts any decodable source into one [`OutputFormat`]
#[derive(Debug, Clone)]
pub struct FormatConverter {
    format: OutputFormat,
    settings: ProcessingSettings,
}

impl FormatConverter {
    pub fn new(format: OutputFormat, settings: ProcessingSettings) -> Self {
        Self { format, settings }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl ImageHandler for FormatConverter {
    fn process(
        &self,
        source: &Path,
        size: SizeOption,
    ) -> Result<ProcessingResult, ProcessingError> {
        let decoded = decode_source(source)?;
        let artifact = ImageArtifact::from_dynamic(decoded)
            .normalized_for(self.format, &self.settings.alpha_policy);
        let artifact = resize_to_fit(artifact, size);
        let bytes = encode(&artifact, self.format, &self.settings.encode)?;

        tracing::debug!(
            format = %self.format,
            dimensions = %artifact.dimensions(),
            channels = artifact.channels(),
            bytes = bytes.len(),
            "Converted image"
        );

        ProcessingResult::stage(
            &self.settings.work_dir,
            bytes,
            self.format,
            artifact.dimensions(),
            artifact.channels(),
            Operation::ConvertTo(self.format).label(),
        )
    }
}
