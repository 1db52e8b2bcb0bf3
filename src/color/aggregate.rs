//! Merging swatches into a fixed-width prominent color ranking

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::swatch::{ColorSwatch, Rgb, EMPTY_ARGB};
use crate::error::ConfigError;

/// Upper bound on ranked slots per report
pub const MAX_ITEMS: usize = 16;

/// Requested ranking width, always in `1..=MAX_ITEMS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ItemCount(usize);

impl ItemCount {
    pub const ONE: Self = Self(1);
    pub const MAX: Self = Self(MAX_ITEMS);

    /// Zero is rejected; anything above [`MAX_ITEMS`] is clamped.
    pub fn new(count: usize) -> Result<Self, ConfigError> {
        match count {
            0 => Err(ConfigError::InvalidItemCount(count)),
            n if n > MAX_ITEMS => {
                warn!("Item count {} exceeds {}, clamping", n, MAX_ITEMS);
                Ok(Self::MAX)
            }
            n => Ok(Self(n)),
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ItemCount {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<usize> for ItemCount {
    type Error = ConfigError;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl From<ItemCount> for usize {
    fn from(count: ItemCount) -> Self {
        count.0
    }
}

/// One slot of a ranking
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedColor {
    /// `None` marks a padding slot
    pub rgb: Option<Rgb>,
    /// Share of the frame's total population, in `[0, 100]`
    pub ratio: f64,
    /// `ratio` with two decimals and a trailing `%`, empty for padding
    pub percentage: String,
}

impl AggregatedColor {
    pub fn empty() -> Self {
        Self {
            rgb: None,
            ratio: 0.0,
            percentage: String::new(),
        }
    }

    fn ranked(rgb: Rgb, population: u64, total: u64) -> Self {
        let ratio = 100.0 * population as f64 / total as f64;
        Self {
            rgb: Some(rgb),
            ratio,
            percentage: format_percentage(ratio),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rgb.is_none()
    }

    /// Opaque ARGB for filled slots, [`EMPTY_ARGB`] for padding
    pub fn argb(&self) -> u32 {
        self.rgb.map_or(EMPTY_ARGB, Rgb::to_argb)
    }
}

/// Two decimals with ties rounded up, taken from the shortest decimal form
/// of `ratio` so `0.125` prints `0.13%` and `1.005` prints `1.01%`.
fn format_percentage(ratio: f64) -> String {
    if !ratio.is_finite() || ratio < 0.0 {
        return format!("{ratio:.2}%");
    }
    let shortest = ratio.to_string();
    let (whole, fraction) = shortest.split_once('.').unwrap_or((&shortest, ""));
    let digit = |i: usize| u64::from(fraction.as_bytes().get(i).map_or(0, |b| b - b'0'));

    let mut hundredths = whole.parse::<u64>().unwrap_or_default() * 100 + digit(0) * 10 + digit(1);
    if digit(2) >= 5 {
        hundredths += 1;
    }
    format!("{}.{:02}%", hundredths / 100, hundredths % 100)
}

/// Reusable scratch space for ranking swatches.
///
/// Every call starts from cleared state, so one aggregator can serve any
/// number of sequential analyses without values carrying over. Capacity
/// is kept between calls.
#[derive(Debug, Default)]
pub struct SwatchAggregator {
    populations: HashMap<Rgb, u64>,
    ranked: Vec<(Rgb, u64)>,
}

impl SwatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges swatches by color and returns exactly `count` slots.
    ///
    /// Slots are ordered by merged population, highest first; equal
    /// populations are ordered by ascending rgb value. Percentages are
    /// taken against the sum of all input populations. Missing slots,
    /// and every slot when the total is zero, are padding.
    pub fn aggregate(&mut self, swatches: &[ColorSwatch], count: ItemCount) -> Vec<AggregatedColor> {
        self.populations.clear();
        self.ranked.clear();

        let mut total = 0u64;
        for swatch in swatches {
            let population = u64::from(swatch.population);
            total += population;
            *self.populations.entry(swatch.rgb).or_insert(0) += population;
        }

        let k = count.get();
        let mut slots = Vec::with_capacity(k);
        if total > 0 {
            self.ranked.extend(self.populations.drain());
            self.ranked
                .sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            slots.extend(
                self.ranked
                    .iter()
                    .take(k)
                    .map(|&(rgb, population)| AggregatedColor::ranked(rgb, population, total)),
            );
        }
        slots.resize_with(k, AggregatedColor::empty);
        slots
    }
}

/// One-shot [`SwatchAggregator::aggregate`] with fresh scratch space
pub fn aggregate(swatches: &[ColorSwatch], count: ItemCount) -> Vec<AggregatedColor> {
    SwatchAggregator::new().aggregate(swatches, count)
}

/// What the consumer receives for one analyzed frame.
///
/// `colors` and `percentages` are parallel and always the requested width.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorReport {
    pub sequence: u64,
    pub colors: Vec<u32>,
    pub percentages: Vec<String>,
    /// Time from admission to delivery hand-off
    pub elapsed: Duration,
    /// Capture time reported by the device, when the producer had one
    pub device_timestamp: Option<Duration>,
}

impl ColorReport {
    pub fn new(sequence: u64, ranking: Vec<AggregatedColor>, elapsed: Duration) -> Self {
        let colors = ranking.iter().map(AggregatedColor::argb).collect();
        let percentages = ranking.into_iter().map(|slot| slot.percentage).collect();
        Self {
            sequence,
            colors,
            percentages,
            elapsed,
            device_timestamp: None,
        }
    }

    pub fn with_device_timestamp(mut self, timestamp: Option<Duration>) -> Self {
        self.device_timestamp = timestamp;
        self
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Filled slots only, in rank order
    pub fn filled(&self) -> impl Iterator<Item = (u32, &str)> {
        self.colors
            .iter()
            .zip(&self.percentages)
            .filter(|(argb, _)| **argb != EMPTY_ARGB)
            .map(|(&argb, pct)| (argb, pct.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(n: usize) -> ItemCount {
        ItemCount::new(n).unwrap()
    }

    fn swatches(raw: &[(u32, u32)]) -> Vec<ColorSwatch> {
        raw.iter().copied().map(ColorSwatch::from).collect()
    }

    #[test]
    fn duplicate_colors_merge_and_tie_breaks_on_rgb() {
        let input = swatches(&[(0xFF0000, 30), (0x00FF00, 50), (0xFF0000, 20)]);
        let out = aggregate(&input, k(2));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].rgb, Some(Rgb::from_u32(0x00FF00)));
        assert_eq!(out[1].rgb, Some(Rgb::from_u32(0xFF0000)));
        assert_eq!(out[0].percentage, "50.00%");
        assert_eq!(out[1].percentage, "50.00%");
    }

    #[test]
    fn no_swatches_is_all_padding() {
        for n in 1..=MAX_ITEMS {
            let out = aggregate(&[], k(n));
            assert_eq!(out.len(), n);
            assert!(out.iter().all(|slot| slot.is_empty() && slot.percentage.is_empty()));
        }
    }

    #[test]
    fn zero_total_population_is_all_padding() {
        let out = aggregate(&swatches(&[(0x123456, 0), (0x654321, 0)]), k(3));
        assert!(out.iter().all(AggregatedColor::is_empty));
    }

    #[test]
    fn pads_when_fewer_colors_than_slots() {
        let out = aggregate(&swatches(&[(0x000001, 3), (0x000002, 1)]), k(4));

        assert_eq!(out[0].percentage, "75.00%");
        assert_eq!(out[1].percentage, "25.00%");
        assert!(out[2].is_empty() && out[3].is_empty());
        assert_eq!(out[3].argb(), EMPTY_ARGB);
    }

    #[test]
    fn truncates_to_highest_populations() {
        let input = swatches(&[(0xA, 10), (0xB, 40), (0xC, 30), (0xD, 20)]);
        let out = aggregate(&input, k(2));

        let ranked: Vec<_> = out.iter().map(|s| s.rgb.unwrap().value()).collect();
        assert_eq!(ranked, vec![0xB, 0xC]);
        assert_eq!(out[0].percentage, "40.00%");
    }

    #[test]
    fn percentages_use_pre_merge_total() {
        let input = swatches(&[(0x1, 1), (0x1, 1), (0x2, 1)]);
        let out = aggregate(&input, k(2));

        assert_eq!(out[0].percentage, "66.67%");
        assert_eq!(out[1].percentage, "33.33%");
    }

    #[test]
    fn halfway_percentages_round_up() {
        let input = swatches(&[(0x1, 698), (0x2, 101), (0x3, 1)]);
        let out = aggregate(&input, k(3));

        let printed: Vec<_> = out.iter().map(|s| s.percentage.as_str()).collect();
        assert_eq!(printed, vec!["87.25%", "12.63%", "0.13%"]);
        assert_eq!(out[2].ratio, 0.125);

        assert_eq!(format_percentage(0.125), "0.13%");
        assert_eq!(format_percentage(12.625), "12.63%");
        assert_eq!(format_percentage(1.005), "1.01%");
        assert_eq!(format_percentage(99.995), "100.00%");
        assert_eq!(format_percentage(100.0), "100.00%");
        assert_eq!(format_percentage(33.333333333333336), "33.33%");
    }

    #[test]
    fn reused_aggregator_does_not_leak_between_calls() {
        let mut agg = SwatchAggregator::new();
        agg.aggregate(&swatches(&[(0xFFFFFF, 1000), (0x111111, 5)]), k(2));
        let out = agg.aggregate(&swatches(&[(0x222222, 7)]), k(2));

        assert_eq!(out[0].rgb, Some(Rgb::from_u32(0x222222)));
        assert_eq!(out[0].percentage, "100.00%");
        assert!(out[1].is_empty());
    }

    #[test]
    fn item_count_bounds() {
        assert!(matches!(ItemCount::new(0), Err(ConfigError::InvalidItemCount(0))));
        assert_eq!(ItemCount::new(16).unwrap().get(), 16);
        assert_eq!(ItemCount::new(40).unwrap(), ItemCount::MAX);
    }

    #[test]
    fn report_splits_parallel_sequences() {
        let ranking = aggregate(&swatches(&[(0x00FF00, 3), (0x0000FF, 1)]), k(3));
        let report = ColorReport::new(9, ranking, Duration::ZERO);

        assert_eq!(report.colors, vec![0xFF00_FF00, 0xFF00_00FF, EMPTY_ARGB]);
        assert_eq!(report.percentages, vec!["75.00%", "25.00%", ""]);
        assert_eq!(report.filled().count(), 2);
    }
}
