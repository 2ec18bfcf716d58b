//! Resize engine: bounding-box downscale with preserved aspect ratio
//!
//! The dimension math is a pure function ([`fit_within`]) so it can be tested
//! without pixels; [`resize_to_fit`] applies it to an [`ImageArtifact`].

use super::artifact::ImageArtifact;
use super::size::{Dimensions, SizeOption};

/// Compute the largest size that fits `bounds` without enlarging `source`
///
/// The longer source axis is clamped first (width for landscape and square
/// images, height for portrait); the other axis is derived from the source
/// ratio. When the derived axis still overflows its bound it is clamped too
/// and the first axis re-derived. Derived axes are rounded toward zero using
/// integer arithmetic, and no axis goes below 1 px.
///
/// # Examples
///
/// ```
/// use image_utility_bot::imaging::{fit_within, Dimensions};
///
/// // Landscape wider than the box in both directions
/// let out = fit_within(Dimensions::new(3000, 2000), Dimensions::new(1920, 1080));
/// assert_eq!(out, Dimensions::new(1620, 1080));
///
/// // Already small enough: unchanged
/// let out = fit_within(Dimensions::new(500, 500), Dimensions::new(2560, 1440));
/// assert_eq!(out, Dimensions::new(500, 500));
/// ```
pub fn fit_within(source: Dimensions, bounds: Dimensions) -> Dimensions {
    if source.width == 0 || source.height == 0 {
        return source;
    }

    let (src_w, src_h) = (source.width as u64, source.height as u64);
    let (max_w, max_h) = (bounds.width as u64, bounds.height as u64);

    let (mut width, mut height) = if src_w >= src_h {
        let w = src_w.min(max_w);
        (w, w * src_h / src_w)
    } else {
        let h = src_h.min(max_h);
        (h * src_w / src_h, h)
    };

    if height > max_h {
        height = max_h;
        width = height * src_w / src_h;
    }
    if width > max_w {
        width = max_w;
        height = width * src_h / src_w;
    }

    Dimensions::new(width.max(1) as u32, height.max(1) as u32)
}

/// Downscale an artifact to fit the preset, or return it untouched
///
/// `SizeOption::Original` and images already inside the box come back
/// verbatim. Resampling uses Lanczos3.
pub fn resize_to_fit(artifact: ImageArtifact, size: SizeOption) -> ImageArtifact {
    let Some(bounds) = size.dimensions() else {
        return artifact;
    };

    let source = artifact.dimensions();
    let target = fit_within(source, bounds);
    if target == source {
        return artifact;
    }

    tracing::debug!(
        from = %source,
        to = %target,
        preset = %size,
        "Resizing image"
    );
    artifact.resized(target)
}
