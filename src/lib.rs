//! Prominent color extraction from live camera preview frames.
//!
//! Frames pass through a throttled single-flight [`pipeline::FrameGate`],
//! are normalized to RGB by [`capture::FrameDecoder`], quantized by a
//! [`color::SwatchGenerator`] and ranked by [`color::SwatchAggregator`].
//! Each analyzed frame yields one [`color::ColorReport`] on a channel.

pub mod capture;
pub mod color;
pub mod error;
pub mod pipeline;
pub mod utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::capture::FrameDecoder;
use crate::color::{HistogramGenerator, ItemCount};
use crate::error::ConfigError;
use crate::pipeline::AnalysisSettings;
use crate::utils::FoundDevice;

pub use capture::{FrameBuffer, PixelFormat};
pub use color::ColorReport;
pub use pipeline::AnalysisPipeline;

/// Prefix for environment overrides, e.g. `COLORCAST_ANALYSIS__ITEM_COUNT=5`
pub const ENV_PREFIX: &str = "COLORCAST";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    pub palette: PaletteConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Still images from `replay_dir`
    Replay,
    /// V4L2 device (requires the `v4l2` feature)
    Camera,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: SourceKind,
    pub device: FoundDevice,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub buffer_count: u32,
    pub replay_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub item_count: usize,
    pub min_interval_ms: u64,
    pub jpeg_quality: u8, // YUV re-encode quality
}

/// Parameters of the bundled histogram swatch generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub max_colors: usize,
    pub quantize_bits: u8,
    pub sample_stride: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Bound on undelivered reports. Unset means unbounded; reports beyond a
    /// bound are dropped with a warning.
    pub channel_capacity: Option<usize>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Replay,
            device: FoundDevice::default(),
            width: 640,
            height: 480,
            fps: 30,
            buffer_count: 4,
            replay_dir: PathBuf::from("frames"),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            item_count: 1,
            min_interval_ms: 1000,
            jpeg_quality: capture::decoder::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            max_colors: 16,
            quantize_bits: 5,
            sample_stride: 1,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: None,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `COLORCAST_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn analysis_settings(&self) -> Result<AnalysisSettings, ConfigError> {
        Ok(AnalysisSettings {
            item_count: ItemCount::new(self.analysis.item_count)?,
            min_interval: Duration::from_millis(self.analysis.min_interval_ms),
        })
    }

    pub fn decoder(&self) -> Result<FrameDecoder, ConfigError> {
        FrameDecoder::new(self.analysis.jpeg_quality)
    }

    pub fn generator(&self) -> Result<HistogramGenerator, ConfigError> {
        HistogramGenerator::new(
            self.palette.quantize_bits,
            self.palette.max_colors,
            self.palette.sample_stride,
        )
    }

    /// Report channel between the pipeline and its consumer.
    pub fn report_channel(&self) -> Result<(Sender<ColorReport>, Receiver<ColorReport>), ConfigError> {
        match self.delivery.channel_capacity {
            None => Ok(flume::unbounded()),
            Some(0) => Err(ConfigError::InvalidChannelCapacity),
            Some(n) => Ok(flume::bounded(n)),
        }
    }

    /// Runs every check, so bad settings surface before any frame arrives.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis_settings()?;
        self.decoder()?;
        self.generator()?;
        self.report_channel()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();

        let settings = config.analysis_settings().unwrap();
        assert_eq!(settings.item_count.get(), 1);
        assert_eq!(settings.min_interval, Duration::from_millis(1000));
        assert_eq!(config.decoder().unwrap().jpeg_quality(), 100);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [analysis]
            item_count = 5
            min_interval_ms = 250

            [capture]
            source = "camera"
            device = { path = "/dev/video2", format = "nv21" }
            "#,
        )
        .unwrap();

        assert_eq!(config.analysis.item_count, 5);
        assert_eq!(config.analysis.jpeg_quality, 100);
        assert_eq!(config.capture.source, SourceKind::Camera);
        assert_eq!(config.capture.device.format, PixelFormat::Nv21);
        assert_eq!(config.capture.fps, 30);
        assert_eq!(config.palette, PaletteConfig::default());
    }

    #[test]
    fn item_count_zero_is_rejected_and_large_is_clamped() {
        let mut config = Config::default();
        config.analysis.item_count = 0;
        assert!(matches!(
            config.analysis_settings(),
            Err(ConfigError::InvalidItemCount(0))
        ));

        config.analysis.item_count = 99;
        assert_eq!(config.analysis_settings().unwrap().item_count, ItemCount::MAX);
    }

    #[test]
    fn report_channel_is_unbounded_unless_capped() {
        let (tx, _rx) = Config::default().report_channel().unwrap();
        assert_eq!(tx.capacity(), None);

        let config = Config::from_toml("[delivery]\nchannel_capacity = 8").unwrap();
        let (tx, _rx) = config.report_channel().unwrap();
        assert_eq!(tx.capacity(), Some(8));
    }

    #[test]
    fn invalid_sections_fail_validation() {
        let mut config = Config::default();
        config.delivery.channel_capacity = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidChannelCapacity)));

        let mut config = Config::default();
        config.analysis.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidJpegQuality(0))));

        let mut config = Config::default();
        config.palette.quantize_bits = 12;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidQuantizeBits(12))));
    }

    #[test]
    fn malformed_toml_is_a_load_error() {
        let err = Config::from_toml("[analysis]\nitem_count = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
