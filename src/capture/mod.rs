pub mod decoder;
pub mod frame;
pub mod replay;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use decoder::{DecodedImage, FrameDecoder};
pub use frame::{FrameBuffer, FrameMetadata, PixelFormat};
pub use replay::ReplaySource;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Capture;
