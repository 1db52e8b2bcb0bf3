//! Error types for the analysis pipeline

use thiserror::Error;

use crate::capture::PixelFormat;

/// Why the YUV re-encode path produced no image.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("frame has zero-sized dimensions {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("buffer holds {actual} bytes, {expected} needed")]
    Truncated { expected: usize, actual: usize },

    #[error("jpeg re-encode failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("re-encoded jpeg could not be decoded: {0}")]
    Decode(#[source] image::ImageError),
}

/// A raw frame buffer could not be turned into a raster.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cannot decode {format:?} frame ({width}x{height}): {source}")]
    Undecodable {
        format: PixelFormat,
        width: u32,
        height: u32,
        /// Failure of the YUV path, when the format took it first
        conversion: Option<ConversionError>,
        #[source]
        source: image::ImageError,
    },
}

/// The consumer endpoint could not take a report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("result consumer disconnected")]
    Disconnected,

    #[error("result consumer is {capacity} reports behind")]
    Backlogged { capacity: usize },
}

/// Invalid settings, surfaced at configuration time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("item count must be at least 1, got {0}")]
    InvalidItemCount(usize),

    #[error("jpeg quality must be in 1..=100, got {0}")]
    InvalidJpegQuality(u8),

    #[error("quantize bits must be in 1..=8, got {0}")]
    InvalidQuantizeBits(u8),

    #[error("palette must allow at least one color")]
    InvalidMaxColors,

    #[error("delivery channel capacity must be at least 1")]
    InvalidChannelCapacity,

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Per-frame failure. Never fatal to the pipeline.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("swatch generator failed: {0}")]
    Generator(String),

    #[error("analysis task aborted: {0}")]
    Aborted(String),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
