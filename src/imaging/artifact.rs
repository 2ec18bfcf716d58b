//! Decoded image artifacts and channel-layout normalization
//!
//! An [`ImageArtifact`] is always 8-bit RGB or 8-bit RGBA. Sources with other
//! layouts (gray, gray+alpha, 16-bit, float) are converted on load, so the
//! channel count downstream is always 3 or 4.

use super::format::OutputFormat;
use super::size::Dimensions;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, Rgb, RgbImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// How an alpha plane is removed when the target format has no alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlattenStrategy {
    /// Discard the alpha channel and keep the stored color values
    Drop,
    /// Blend each pixel over the matte color using its alpha
    #[default]
    Composite,
}

/// Alpha flattening policy applied when converting 4 channels to 3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaPolicy {
    pub strategy: FlattenStrategy,
    /// Background color used by [`FlattenStrategy::Composite`]
    pub matte: [u8; 3],
}

impl Default for AlphaPolicy {
    fn default() -> Self {
        Self {
            strategy: FlattenStrategy::Composite,
            matte: [255, 255, 255],
        }
    }
}

impl AlphaPolicy {
    /// Policy that drops the alpha plane without blending
    pub fn drop_channel() -> Self {
        Self {
            strategy: FlattenStrategy::Drop,
            matte: [255, 255, 255],
        }
    }

    /// Policy that composites over the given matte color
    pub fn composite(matte: [u8; 3]) -> Self {
        Self {
            strategy: FlattenStrategy::Composite,
            matte,
        }
    }

    fn flatten_pixel(&self, pixel: &Rgba<u8>) -> Rgb<u8> {
        let [r, g, b, a] = pixel.0;
        match self.strategy {
            FlattenStrategy::Drop => Rgb([r, g, b]),
            FlattenStrategy::Composite => {
                let blend = |fg: u8, bg: u8| -> u8 {
                    let a = a as u32;
                    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
                };
                Rgb([
                    blend(r, self.matte[0]),
                    blend(g, self.matte[1]),
                    blend(b, self.matte[2]),
                ])
            }
        }
    }
}

/// A decoded raster ready for transformation
#[derive(Debug, Clone, PartialEq)]
pub enum ImageArtifact {
    /// Three channels, no alpha
    Rgb(RgbImage),
    /// Four channels, alpha present
    Rgba(RgbaImage),
}

impl ImageArtifact {
    /// Build an artifact from any decoded image, keeping alpha if present
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb8(buffer) => Self::Rgb(buffer),
            DynamicImage::ImageRgba8(buffer) => Self::Rgba(buffer),
            other if other.color().has_alpha() => Self::Rgba(other.to_rgba8()),
            other => Self::Rgb(other.to_rgb8()),
        }
    }

    /// Pixel layout of [`Self::as_raw`] as the encoders expect it
    pub fn color_type(&self) -> ExtendedColorType {
        match self {
            Self::Rgb(_) => ExtendedColorType::Rgb8,
            Self::Rgba(_) => ExtendedColorType::Rgba8,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Rgb(buffer) => buffer.width(),
            Self::Rgba(buffer) => buffer.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Rgb(buffer) => buffer.height(),
            Self::Rgba(buffer) => buffer.height(),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Number of channels: 3 without alpha, 4 with alpha
    pub fn channels(&self) -> u8 {
        match self {
            Self::Rgb(_) => 3,
            Self::Rgba(_) => 4,
        }
    }

    /// Interleaved 8-bit pixel buffer
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Rgb(buffer) => buffer.as_raw(),
            Self::Rgba(buffer) => buffer.as_raw(),
        }
    }

    /// Add a fully opaque alpha channel (no-op if already present)
    pub fn with_alpha(self) -> Self {
        match self {
            Self::Rgb(buffer) => Self::Rgba(DynamicImage::ImageRgb8(buffer).to_rgba8()),
            rgba @ Self::Rgba(_) => rgba,
        }
    }

    /// Remove the alpha channel using `policy` (no-op if absent)
    pub fn without_alpha(self, policy: &AlphaPolicy) -> Self {
        match self {
            rgb @ Self::Rgb(_) => rgb,
            Self::Rgba(buffer) => {
                let flattened = RgbImage::from_fn(buffer.width(), buffer.height(), |x, y| {
                    policy.flatten_pixel(buffer.get_pixel(x, y))
                });
                Self::Rgb(flattened)
            }
        }
    }

    /// Retarget the channel layout for `format`
    ///
    /// PNG always gets 4 channels; every other format gets 3.
    pub fn normalized_for(self, format: OutputFormat, policy: &AlphaPolicy) -> Self {
        if format.keeps_alpha() {
            self.with_alpha()
        } else {
            self.without_alpha(policy)
        }
    }

    /// Resample to exactly `target` with Lanczos3
    pub fn resized(&self, target: Dimensions) -> Self {
        match self {
            Self::Rgb(buffer) => Self::Rgb(imageops::resize(
                buffer,
                target.width,
                target.height,
                FilterType::Lanczos3,
            )),
            Self::Rgba(buffer) => Self::Rgba(imageops::resize(
                buffer,
                target.width,
                target.height,
                FilterType::Lanczos3,
            )),
        }
    }
}
