//! Image processing core
//!
//! - [`size`]: resolution presets
//! - [`resize`]: aspect-preserving downscale
//! - [`artifact`]: decoded rasters and alpha flattening
//! - [`format`]: output formats and encoders
//! - [`converter`] / [`background`]: the two processing handlers
//! - [`pipeline`]: operation dispatch and the blocking job pool

pub mod artifact;
pub mod background;
pub mod converter;
pub mod format;
pub mod pipeline;
pub mod resize;
pub mod size;

pub use artifact::{AlphaPolicy, FlattenStrategy, ImageArtifact};
pub use background::{BackgroundRemover, CommandExtractor, ForegroundExtractor};
pub use converter::FormatConverter;
pub use format::{encode, EncodeSettings, OutputFormat, PngCompression};
pub use pipeline::{ImageHandler, Operation, Pipeline, ProcessingResult, ProcessingSettings};
pub use resize::{fit_within, resize_to_fit};
pub use size::{Dimensions, SizeOption, CATALOG};
