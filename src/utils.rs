use serde::{Deserialize, Serialize};

use crate::capture::PixelFormat;

// Capture device and the layout it streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundDevice {
    pub path: String,
    pub format: PixelFormat,
}

impl FoundDevice {
    pub fn new(path: String, format: PixelFormat) -> Self {
        Self { path, format }
    }
}

impl Default for FoundDevice {
    fn default() -> Self {
        Self::new("/dev/video0".into(), PixelFormat::Yuyv4)
    }
}

/// V4L2 four-character code for a pixel layout
pub fn fourcc(format: PixelFormat) -> [u8; 4] {
    match format {
        PixelFormat::Nv21 => *b"NV21",
        PixelFormat::Nv12 => *b"NV12",
        PixelFormat::Nv16 => *b"NV16",
        PixelFormat::Yuyv4 => *b"YUYV",
        PixelFormat::Compressed => *b"MJPG",
    }
}

pub fn format_from_fourcc(code: &[u8; 4]) -> Option<PixelFormat> {
    match code {
        b"NV21" => Some(PixelFormat::Nv21),
        b"NV12" => Some(PixelFormat::Nv12),
        b"NV16" => Some(PixelFormat::Nv16),
        b"YUYV" => Some(PixelFormat::Yuyv4),
        b"MJPG" | b"JPEG" => Some(PixelFormat::Compressed),
        _ => None,
    }
}

/// Auto-detect best capture device
#[cfg(feature = "v4l2")]
pub fn auto_detect_device() -> color_eyre::Result<FoundDevice> {
    use color_eyre::eyre::eyre;
    use std::path::Path;
    use tracing::info;
    use v4l::{capability::Flags, video::Capture, Device};

    info!("Auto-detecting capture devices...");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }
        let Ok(formats) = dev.enum_formats() else {
            continue;
        };

        // Prefer compressed streams, then anything the decoder can expand
        let mut supported: Vec<PixelFormat> = formats
            .iter()
            .filter_map(|fmt| format_from_fourcc(&fmt.fourcc.repr))
            .collect();
        supported.sort_by_key(|format| format.is_yuv());
        if let Some(&format) = supported.first() {
            info!("Found {:?} device: {} - {}", format, path, caps.card);
            return Ok(FoundDevice::new(path, format));
        }
    }

    Err(eyre!("No suitable capture device found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_round_trips_for_every_format() {
        for format in [
            PixelFormat::Nv21,
            PixelFormat::Nv12,
            PixelFormat::Nv16,
            PixelFormat::Yuyv4,
            PixelFormat::Compressed,
        ] {
            assert_eq!(format_from_fourcc(&fourcc(format)), Some(format));
        }
        assert_eq!(format_from_fourcc(b"RGB3"), None);
    }
}
