use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A raw preview frame as delivered by the producer.
///
/// Owned by exactly one analysis attempt; never cloned or reused.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Raw sensor bytes, layout given by `meta.format`
    pub data: Bytes,

    /// Frame metadata
    pub meta: FrameMetadata,

    /// Receipt timestamp, used for admission
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub device_timestamp: Option<Duration>, // Hardware timestamp if available
}

/// Pixel layouts a producer may hand us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Y plane followed by interleaved V/U at quarter resolution
    Nv21,
    /// Y plane followed by interleaved U/V at quarter resolution
    Nv12,
    /// Y plane followed by interleaved U/V at half horizontal resolution
    Nv16,
    /// Packed Y0 U Y1 V (YUY2)
    Yuyv4,
    /// Self-describing compressed still (MJPEG frame, JPEG, PNG)
    Compressed,
}

impl PixelFormat {
    pub fn is_yuv(self) -> bool {
        !matches!(self, PixelFormat::Compressed)
    }

    /// Number of bytes a `width`x`height` frame occupies, `None` for compressed data.
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let w = width as usize;
        let h = height as usize;
        // Chroma pairs cover two columns; odd widths still carry a full pair.
        let chroma_row = 2 * w.div_ceil(2);
        match self {
            PixelFormat::Nv21 | PixelFormat::Nv12 => Some(w * h + chroma_row * h.div_ceil(2)),
            PixelFormat::Nv16 => Some(w * h + chroma_row * h),
            PixelFormat::Yuyv4 => Some(2 * chroma_row * h),
            PixelFormat::Compressed => None,
        }
    }
}

impl FrameBuffer {
    pub fn new(data: impl Into<Bytes>, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            meta: FrameMetadata {
                sequence: 0,
                width,
                height,
                format,
                device_timestamp: None,
            },
            timestamp: Instant::now(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.meta.sequence = sequence;
        self
    }

    pub fn with_device_timestamp(mut self, timestamp: Duration) -> Self {
        self.meta.device_timestamp = Some(timestamp);
        self
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semi_planar_lengths() {
        assert_eq!(PixelFormat::Nv21.frame_len(4, 2), Some(8 + 4));
        assert_eq!(PixelFormat::Nv12.frame_len(3, 3), Some(9 + 4 * 2));
        assert_eq!(PixelFormat::Nv16.frame_len(4, 2), Some(8 + 8));
    }

    #[test]
    fn packed_and_compressed_lengths() {
        assert_eq!(PixelFormat::Yuyv4.frame_len(4, 2), Some(16));
        assert_eq!(PixelFormat::Yuyv4.frame_len(3, 1), Some(8));
        assert_eq!(PixelFormat::Compressed.frame_len(640, 480), None);
        assert!(!PixelFormat::Compressed.is_yuv());
    }
}
