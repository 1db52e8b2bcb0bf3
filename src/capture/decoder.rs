//! Frame normalization: raw sensor buffers into RGB rasters

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, RgbImage};
use tracing::debug;

use super::frame::{FrameBuffer, FrameMetadata, PixelFormat};
use crate::error::{ConfigError, ConversionError, DecodeError};

/// In-memory packed RGB raster handed to the swatch generator
pub type DecodedImage = RgbImage;

pub const DEFAULT_JPEG_QUALITY: u8 = 100;

/// Turns a [`FrameBuffer`] into a [`DecodedImage`].
///
/// YUV layouts are expanded, compressed to a JPEG still of the declared
/// size and decoded back. Anything else, or a YUV buffer that fails that
/// path, is decoded directly as a self-describing image.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    jpeg_quality: u8,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl FrameDecoder {
    pub fn new(jpeg_quality: u8) -> Result<Self, ConfigError> {
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::InvalidJpegQuality(jpeg_quality));
        }
        Ok(Self { jpeg_quality })
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Consumes the frame; the raw bytes are released once this returns.
    pub fn decode(&self, frame: FrameBuffer) -> Result<DecodedImage, DecodeError> {
        let FrameBuffer { data, meta, .. } = frame;

        let conversion = if meta.format.is_yuv() {
            match self.reencode(&data, &meta) {
                Ok(image) => return Ok(image),
                Err(e) => {
                    debug!(
                        "Frame {} YUV path failed ({}), trying direct decode",
                        meta.sequence, e
                    );
                    Some(e)
                }
            }
        } else {
            None
        };

        image::load_from_memory(&data)
            .map(|image| image.into_rgb8())
            .map_err(|source| DecodeError::Undecodable {
                format: meta.format,
                width: meta.width,
                height: meta.height,
                conversion,
                source,
            })
    }

    fn reencode(&self, data: &[u8], meta: &FrameMetadata) -> Result<DecodedImage, ConversionError> {
        let rgb = expand_yuv(data, meta.format, meta.width, meta.height)?;

        let mut jpeg = Vec::with_capacity(data.len() / 4);
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(ConversionError::Encode)?;

        image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .map(|image| image.into_rgb8())
            .map_err(ConversionError::Decode)
    }
}

/// Where the chroma samples for a pixel live
#[derive(Debug, Clone, Copy)]
enum ChromaLayout {
    /// Interleaved chroma plane after the luma plane, one chroma row per `rows` luma rows
    SemiPlanar { v_first: bool, rows: usize },
    /// Y0 U Y1 V
    Packed,
}

impl ChromaLayout {
    fn of(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Nv21 => Some(Self::SemiPlanar {
                v_first: true,
                rows: 2,
            }),
            PixelFormat::Nv12 => Some(Self::SemiPlanar {
                v_first: false,
                rows: 2,
            }),
            PixelFormat::Nv16 => Some(Self::SemiPlanar {
                v_first: false,
                rows: 1,
            }),
            PixelFormat::Yuyv4 => Some(Self::Packed),
            PixelFormat::Compressed => None,
        }
    }
}

fn expand_yuv(
    data: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<RgbImage, ConversionError> {
    if width == 0 || height == 0 {
        return Err(ConversionError::EmptyDimensions { width, height });
    }
    let (Some(layout), Some(expected)) = (ChromaLayout::of(format), format.frame_len(width, height))
    else {
        return Err(ConversionError::Truncated {
            expected: 0,
            actual: data.len(),
        });
    };
    if data.len() < expected {
        return Err(ConversionError::Truncated {
            expected,
            actual: data.len(),
        });
    }

    let w = width as usize;
    let luma_len = w * height as usize;
    let chroma_row = 2 * w.div_ceil(2);

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let pair = x & !1;
        let (luma, cb, cr) = match layout {
            ChromaLayout::SemiPlanar { v_first, rows } => {
                let c = luma_len + (y / rows) * chroma_row + pair;
                let (first, second) = (data[c], data[c + 1]);
                let (cb, cr) = if v_first {
                    (second, first)
                } else {
                    (first, second)
                };
                (data[y * w + x], cb, cr)
            }
            ChromaLayout::Packed => {
                let p = y * 2 * chroma_row + pair * 2;
                (data[p + (x & 1) * 2], data[p + 1], data[p + 3])
            }
        };
        image::Rgb(ycbcr_to_rgb(luma, cb, cr))
    }))
}

/// Full-range (JFIF) YCbCr to RGB in 16.16 fixed point
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = i32::from(y) << 16;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    let r = y + 91_881 * cr;
    let g = y - 22_554 * cb - 46_802 * cr;
    let b = y + 116_130 * cb;

    [fixed_to_u8(r), fixed_to_u8(g), fixed_to_u8(b)]
}

fn fixed_to_u8(v: i32) -> u8 {
    ((v + (1 << 15)) >> 16).clamp(0, 255) as u8
}
