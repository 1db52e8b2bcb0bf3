//! Bucketed color histogram, the bundled swatch generator

use std::collections::HashMap;

use super::swatch::{ColorSwatch, Rgb, SwatchGenerator};
use crate::capture::DecodedImage;
use crate::error::ConfigError;

/// Quantizes pixels to `quantize_bits` per channel and reports the
/// average color of the most populated buckets.
#[derive(Debug, Clone)]
pub struct HistogramGenerator {
    quantize_bits: u8,
    max_colors: usize,
    sample_stride: usize,
}

impl Default for HistogramGenerator {
    fn default() -> Self {
        Self {
            quantize_bits: 5,
            max_colors: 16,
            sample_stride: 1,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    count: u32,
    sum: [u64; 3],
}

impl Bucket {
    fn mean(&self) -> Rgb {
        let n = u64::from(self.count.max(1));
        let [r, g, b] = self.sum.map(|s| ((s + n / 2) / n) as u8);
        Rgb::new(r, g, b)
    }
}

impl HistogramGenerator {
    /// A stride of 0 is treated as 1.
    pub fn new(quantize_bits: u8, max_colors: usize, sample_stride: usize) -> Result<Self, ConfigError> {
        if !(1..=8).contains(&quantize_bits) {
            return Err(ConfigError::InvalidQuantizeBits(quantize_bits));
        }
        if max_colors == 0 {
            return Err(ConfigError::InvalidMaxColors);
        }
        Ok(Self {
            quantize_bits,
            max_colors,
            sample_stride: sample_stride.max(1),
        })
    }

    fn bucket_key(&self, [r, g, b]: [u8; 3]) -> u32 {
        let bits = u32::from(self.quantize_bits);
        let shift = 8 - bits;
        (u32::from(r) >> shift) << (2 * bits) | (u32::from(g) >> shift) << bits | (u32::from(b) >> shift)
    }
}

impl SwatchGenerator for HistogramGenerator {
    fn generate(&self, image: &DecodedImage) -> Vec<ColorSwatch> {
        let mut buckets: HashMap<u32, Bucket> = HashMap::new();
        for px in image.pixels().step_by(self.sample_stride) {
            let bucket = buckets.entry(self.bucket_key(px.0)).or_default();
            bucket.count += 1;
            for (sum, channel) in bucket.sum.iter_mut().zip(px.0) {
                *sum += u64::from(channel);
            }
        }

        let mut ranked: Vec<(u32, Bucket)> = buckets.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(&b.0)));
        ranked.truncate(self.max_colors);

        ranked
            .into_iter()
            .map(|(_, bucket)| ColorSwatch::new(bucket.mean(), bucket.count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn striped(colors: &[([u8; 3], u32)]) -> RgbImage {
        let width: u32 = colors.iter().map(|(_, n)| n).sum();
        let mut img = RgbImage::new(width, 1);
        let mut x = 0;
        for &(color, n) in colors {
            for _ in 0..n {
                img.put_pixel(x, 0, image::Rgb(color));
                x += 1;
            }
        }
        img
    }

    #[test]
    fn populations_follow_pixel_counts() {
        let img = striped(&[([250, 0, 0], 30), ([0, 0, 250], 10)]);
        let swatches = HistogramGenerator::default().generate(&img);

        assert_eq!(
            swatches,
            vec![
                ColorSwatch::new([250, 0, 0], 30),
                ColorSwatch::new([0, 0, 250], 10),
            ]
        );
    }

    #[test]
    fn nearby_colors_share_a_bucket_and_average() {
        let img = striped(&[([200, 200, 200], 1), ([202, 202, 202], 1)]);
        let swatches = HistogramGenerator::default().generate(&img);

        assert_eq!(swatches, vec![ColorSwatch::new([201, 201, 201], 2)]);
    }

    #[test]
    fn keeps_only_max_colors() {
        let img = striped(&[([0, 0, 0], 5), ([255, 255, 255], 4), ([0, 255, 0], 3)]);
        let swatches = HistogramGenerator::new(5, 2, 1).unwrap().generate(&img);

        assert_eq!(swatches.len(), 2);
        assert_eq!(swatches[1].population, 4);
    }

    #[test]
    fn stride_samples_every_nth_pixel() {
        let img = striped(&[([9, 9, 9], 10)]);
        let swatches = HistogramGenerator::new(5, 16, 3).unwrap().generate(&img);

        assert_eq!(swatches[0].population, 4);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(
            HistogramGenerator::new(0, 16, 1),
            Err(ConfigError::InvalidQuantizeBits(0))
        ));
        assert!(matches!(
            HistogramGenerator::new(9, 16, 1),
            Err(ConfigError::InvalidQuantizeBits(9))
        ));
        assert!(matches!(
            HistogramGenerator::new(5, 0, 1),
            Err(ConfigError::InvalidMaxColors)
        ));
    }
}
