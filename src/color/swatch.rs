use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capture::DecodedImage;

/// Packed ARGB value reserved for unfilled report slots (fully transparent).
pub const EMPTY_ARGB: u32 = 0x0000_0000;

/// 24-bit color, `0xRRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rgb(u32);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Keeps the low 24 bits; any alpha byte is discarded.
    pub const fn from_u32(value: u32) -> Self {
        Self(value & 0x00FF_FFFF)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Opaque ARGB packing, never equal to [`EMPTY_ARGB`]
    pub const fn to_argb(self) -> u32 {
        0xFF00_0000 | self.0
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<image::Rgb<u8>> for Rgb {
    fn from(px: image::Rgb<u8>) -> Self {
        Self::from(px.0)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

/// One representative color and the number of pixels it stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSwatch {
    pub rgb: Rgb,
    pub population: u32,
}

impl ColorSwatch {
    pub fn new(rgb: impl Into<Rgb>, population: u32) -> Self {
        Self {
            rgb: rgb.into(),
            population,
        }
    }
}

impl From<(u32, u32)> for ColorSwatch {
    fn from((rgb, population): (u32, u32)) -> Self {
        Self {
            rgb: Rgb::from_u32(rgb),
            population,
        }
    }
}

/// Color quantizer consumed by the pipeline.
///
/// Runs on the blocking pool, once per admitted frame. Output order is
/// irrelevant and several swatches may share a color.
pub trait SwatchGenerator: Send + Sync {
    fn generate(&self, image: &DecodedImage) -> Vec<ColorSwatch>;
}

impl<F> SwatchGenerator for F
where
    F: Fn(&DecodedImage) -> Vec<ColorSwatch> + Send + Sync,
{
    fn generate(&self, image: &DecodedImage) -> Vec<ColorSwatch> {
        self(image)
    }
}
