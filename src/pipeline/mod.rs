pub mod analysis;
pub mod gate;
pub mod stats;

pub use analysis::{AnalysisPipeline, AnalysisSettings, AnalysisTask, Submission};
pub use gate::{FrameGate, GatePermit};
pub use stats::StatsSnapshot;
