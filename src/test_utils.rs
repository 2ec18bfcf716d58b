//! Test utilities
//!
//! Temporary directories, in-memory test images and assertion helpers shared
//! by the unit tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Panics
///
/// Panics if the directory cannot be created
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .expect("Failed to encode test image");
    out.into_inner()
}

/// JPEG bytes of a `width` x `height` gradient
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

/// PNG bytes of a half-transparent red image
pub fn png_rgba_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 128]));
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

/// Files in `dir` that hold downloaded uploads
pub fn upload_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().starts_with("upload-"))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

/// Assert that `result` failed with a configuration error mentioning `expected`
///
/// # Panics
///
/// Panics if the result is Ok, is not a configuration error, or the message
/// does not contain `expected`
pub fn assert_config_error(result: crate::error::Result<()>, expected: &str) {
    match result {
        Ok(()) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            assert!(
                matches!(
                    e.downcast_ref::<crate::error::BotError>(),
                    Some(crate::error::BotError::Config(_))
                ),
                "Expected a configuration error, got '{}'",
                e
            );
            let message = e.to_string();
            assert!(
                message.contains(expected),
                "Error message '{}' does not contain '{}'",
                message,
                expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;

    #[test]
    fn test_jpeg_bytes_decode_to_requested_size() {
        let image = image::load_from_memory(&jpeg_bytes(30, 20)).unwrap();
        assert_eq!((image.width(), image.height()), (30, 20));
    }

    #[test]
    fn test_png_rgba_bytes_keep_alpha() {
        let image = image::load_from_memory(&png_rgba_bytes(4, 4)).unwrap();
        assert!(image.color().has_alpha());
    }

    #[test]
    fn test_upload_files_filters_prefix() {
        let dir = temp_dir();
        std::fs::write(dir.path().join("upload-1.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("output-1.png"), b"x").unwrap();
        assert_eq!(
            upload_files(dir.path()),
            vec![dir.path().join("upload-1.jpg")]
        );
    }

    #[test]
    #[should_panic(expected = "configuration error")]
    fn test_assert_config_error_rejects_other_errors() {
        assert_config_error(Err(BotError::Transport("down".into()).into()), "down");
    }
}
