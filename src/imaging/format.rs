//! Output formats and per-format encoding
//!
//! | Format | Encoder | Settings |
//! |---|---|---|
//! | PNG | `PngEncoder` | configurable compression, adaptive filter |
//! | JPEG | `JpegEncoder` | configurable quality (default 95) |
//! | WebP | `WebPEncoder` | lossless |
//! | BMP / TIFF | `image::write_buffer_with_format` | encoder defaults |

use super::artifact::ImageArtifact;
use crate::error::ProcessingError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tiff,
}

impl OutputFormat {
    /// Every supported format
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::Webp,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
    ];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    /// MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }

    /// Upper-case label used in captions ("JPG", "PNG", ...)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPG",
            Self::Webp => "WEBP",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
        }
    }

    /// Whether output in this format carries an alpha channel
    pub fn keeps_alpha(&self) -> bool {
        matches!(self, Self::Png)
    }

    /// Look up a format from a declared MIME type such as `image/jpeg`
    ///
    /// # Examples
    ///
    /// ```
    /// use image_utility_bot::imaging::OutputFormat;
    ///
    /// assert_eq!(OutputFormat::from_mime("image/JPEG"), Some(OutputFormat::Jpeg));
    /// assert_eq!(OutputFormat::from_mime("image/gif"), None);
    /// assert_eq!(OutputFormat::from_mime("text/plain"), None);
    /// ```
    pub fn from_mime(mime: &str) -> Option<Self> {
        let subtype = mime.trim().to_ascii_lowercase();
        let subtype = subtype.strip_prefix("image/")?;
        subtype.parse().ok()
    }
}

impl FromStr for OutputFormat {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            other => Err(ProcessingError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// PNG compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PngCompression {
    /// Fastest, largest files
    Fast,
    /// Balanced mid setting
    #[default]
    Default,
    /// Smallest files, slowest
    Best,
}

impl PngCompression {
    fn as_codec(self) -> CompressionType {
        match self {
            Self::Fast => CompressionType::Fast,
            Self::Default => CompressionType::Default,
            Self::Best => CompressionType::Best,
        }
    }
}

/// Encoder parameters shared by every handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub png_compression: PngCompression,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            png_compression: PngCompression::Default,
            jpeg_quality: 95,
        }
    }
}

/// Encode an artifact into `format`
///
/// The artifact must already be normalized for the format; JPEG rejects
/// four-channel input.
///
/// # Errors
///
/// Returns [`ProcessingError::EncodeFailure`] when the encoder refuses the
/// pixel layout or fails internally.
pub fn encode(
    artifact: &ImageArtifact,
    format: OutputFormat,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, ProcessingError> {
    let (width, height) = (artifact.width(), artifact.height());
    let (pixels, color) = (artifact.as_raw(), artifact.color_type());
    let mut buffer = Vec::new();

    let outcome = match format {
        OutputFormat::Png => PngEncoder::new_with_quality(
            &mut buffer,
            settings.png_compression.as_codec(),
            PngFilter::Adaptive,
        )
        .write_image(pixels, width, height, color),
        OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut buffer, settings.jpeg_quality)
            .write_image(pixels, width, height, color),
        OutputFormat::Webp => {
            WebPEncoder::new_lossless(&mut buffer).write_image(pixels, width, height, color)
        }
        OutputFormat::Bmp => image::write_buffer_with_format(
            &mut Cursor::new(&mut buffer),
            pixels,
            width,
            height,
            color,
            ImageFormat::Bmp,
        ),
        OutputFormat::Tiff => image::write_buffer_with_format(
            &mut Cursor::new(&mut buffer),
            pixels,
            width,
            height,
            color,
            ImageFormat::Tiff,
        ),
    };

    outcome.map_err(|e| ProcessingError::EncodeFailure {
        format: format.label().to_string(),
        message: e.to_string(),
    })?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_parse_accepts_aliases() {
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("tif".parse::<OutputFormat>().unwrap(), OutputFormat::Tiff);
        assert_eq!(" png ".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "gif".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, ProcessingError::UnsupportedFormat(f) if f == "gif"));
    }

    #[test]
    fn test_only_png_keeps_alpha() {
        for format in OutputFormat::ALL {
            assert_eq!(format.keeps_alpha(), format == OutputFormat::Png);
        }
    }

    #[test]
    fn test_encode_every_format_decodes_back() {
        let rgb = ImageArtifact::Rgb(RgbImage::from_pixel(8, 6, Rgb([10, 200, 30])));
        let settings = EncodeSettings::default();

        for format in OutputFormat::ALL {
            let artifact = rgb
                .clone()
                .normalized_for(format, &crate::imaging::AlphaPolicy::default());
            let bytes = encode(&artifact, format, &settings).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (8, 6), "{:?}", format);
            assert_eq!(
                image::guess_format(&bytes).unwrap(),
                match format {
                    OutputFormat::Png => ImageFormat::Png,
                    OutputFormat::Jpeg => ImageFormat::Jpeg,
                    OutputFormat::Webp => ImageFormat::WebP,
                    OutputFormat::Bmp => ImageFormat::Bmp,
                    OutputFormat::Tiff => ImageFormat::Tiff,
                }
            );
        }
    }

    #[test]
    fn test_encode_reads_pixels_in_place() {
        let artifact = ImageArtifact::Rgba(RgbaImage::from_pixel(5, 3, Rgba([9, 8, 7, 6])));
        let pixels = artifact.as_raw().as_ptr();

        let bytes = encode(&artifact, OutputFormat::Png, &EncodeSettings::default()).unwrap();

        assert_eq!(artifact.as_raw().as_ptr(), pixels);
        assert_eq!(artifact.color_type(), image::ExtendedColorType::Rgba8);
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw(), artifact.as_raw());
    }

    #[test]
    fn test_png_output_keeps_four_channels() {
        let rgba = ImageArtifact::Rgba(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 40])));
        let bytes = encode(&rgba, OutputFormat::Png, &EncodeSettings::default()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.color().channel_count(), 4);
    }
}
