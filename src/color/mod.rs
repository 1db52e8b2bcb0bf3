pub mod aggregate;
pub mod histogram;
pub mod swatch;

pub use aggregate::{aggregate, AggregatedColor, ColorReport, ItemCount, SwatchAggregator, MAX_ITEMS};
pub use histogram::HistogramGenerator;
pub use swatch::{ColorSwatch, Rgb, SwatchGenerator, EMPTY_ARGB};
