//! V4L2 preview capture

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use tracing::{info, instrument};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::frame::{FrameBuffer, PixelFormat};
use crate::utils::{format_from_fourcc, fourcc};
use crate::CaptureConfig;

/// Memory-mapped V4L2 capture producing [`FrameBuffer`]s
pub struct V4l2Capture {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    width: u32,
    height: u32,
    format: PixelFormat,
    buffer_count: u32,
    sequence: u64,
}

impl V4l2Capture {
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        info!("Initializing V4L2 capture: {:?}", config.device);

        let device = Device::with_path(&config.device.path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(eyre!("Device doesn't support video capture"));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(&fourcc(config.device.format));

        // Drivers may round the size or substitute a layout
        let applied = device.set_format(&fmt)?;
        let format = format_from_fourcc(&applied.fourcc.repr)
            .ok_or_else(|| eyre!("Driver selected unsupported format {}", applied.fourcc))?;
        info!(
            "Capturing {}x{} {:?}",
            applied.width, applied.height, format
        );

        Ok(Self {
            device: Box::new(device),
            stream: None,
            width: applied.width,
            height: applied.height,
            format,
            buffer_count: config.buffer_count,
            sequence: 0,
        })
    }

    pub fn start_stream(&mut self) -> Result<()> {
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, self.buffer_count)?;

        self.stream = Some(stream);
        info!("Capture stream started with {} buffers", self.buffer_count);
        Ok(())
    }

    /// Blocks until the driver hands over the next buffer.
    #[instrument(skip(self))]
    pub fn next_frame(&mut self) -> Result<FrameBuffer> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| eyre!("Stream not started"))?;

        let (buf, meta) = stream.next()?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = bytes::Bytes::copy_from_slice(&buf[..used]);

        self.sequence += 1;
        let device_timestamp = Duration::from_secs(meta.timestamp.sec as u64)
            + Duration::from_micros(meta.timestamp.usec as u64);

        Ok(FrameBuffer::new(data, self.format, self.width, self.height)
            .with_sequence(self.sequence)
            .with_device_timestamp(device_timestamp))
    }
}
