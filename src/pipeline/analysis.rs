//! Frame analysis: gate, decode, swatch generation, ranking, delivery

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use flume::{Sender, TrySendError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use super::gate::{FrameGate, GatePermit, DEFAULT_MIN_INTERVAL};
use super::stats::{PipelineStats, StatsSnapshot};
use crate::capture::{DecodedImage, FrameBuffer, FrameDecoder};
use crate::color::{ColorReport, ItemCount, SwatchAggregator, SwatchGenerator};
use crate::error::{DecodeError, DeliveryError, FrameError};

/// Validated per-pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub item_count: ItemCount,
    pub min_interval: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            item_count: ItemCount::ONE,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

/// Outcome of handing a frame to the pipeline
#[derive(Debug)]
pub enum Submission {
    /// Dropped by the gate, nothing else happened
    Rejected,
    /// Admitted but undecodable; the gate is already released
    DecodeFailed(DecodeError),
    /// Analysis running in the background
    Started(AnalysisTask),
}

impl Submission {
    pub fn is_started(&self) -> bool {
        matches!(self, Submission::Started(_))
    }

    pub fn into_task(self) -> Option<AnalysisTask> {
        match self {
            Submission::Started(task) => Some(task),
            _ => None,
        }
    }
}

/// Handle to one in-flight analysis. Dropping it does not cancel the work.
#[derive(Debug)]
pub struct AnalysisTask {
    sequence: u64,
    handle: JoinHandle<Result<(), FrameError>>,
}

impl AnalysisTask {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Waits for delivery (or failure) and gate release.
    pub async fn finished(self) -> Result<(), FrameError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(FrameError::Aborted(e.to_string())),
        }
    }
}

struct Shared {
    gate: FrameGate,
    decoder: FrameDecoder,
    generator: Arc<dyn SwatchGenerator>,
    aggregator: Mutex<SwatchAggregator>,
    settings: ArcSwap<AnalysisSettings>,
    sink: Sender<ColorReport>,
    stats: PipelineStats,
}

/// Turns producer frames into [`ColorReport`]s on `sink`.
///
/// `submit` is safe to call from any thread, including threads outside the
/// runtime. Decoding runs on the caller's thread; swatch generation runs on
/// the runtime's blocking pool. At most one frame is analyzed at a time.
#[derive(Clone)]
pub struct AnalysisPipeline {
    inner: Arc<Shared>,
    runtime: Handle,
}

impl AnalysisPipeline {
    pub fn new(
        settings: AnalysisSettings,
        decoder: FrameDecoder,
        generator: Arc<dyn SwatchGenerator>,
        sink: Sender<ColorReport>,
        runtime: Handle,
    ) -> Self {
        info!(
            "Analysis pipeline: {} item(s), {:?} between frames",
            settings.item_count.get(),
            settings.min_interval
        );
        Self {
            inner: Arc::new(Shared {
                gate: FrameGate::new(settings.min_interval),
                decoder,
                generator,
                aggregator: Mutex::new(SwatchAggregator::new()),
                settings: ArcSwap::from_pointee(settings),
                sink,
                stats: PipelineStats::default(),
            }),
            runtime,
        }
    }

    /// Submits a frame using its receipt timestamp.
    pub fn submit(&self, frame: FrameBuffer) -> Submission {
        let now = frame.timestamp;
        self.submit_at(frame, now)
    }

    #[instrument(
        level = "trace",
        skip(self, frame),
        fields(sequence = frame.meta.sequence, device_ts = ?frame.meta.device_timestamp)
    )]
    pub fn submit_at(&self, frame: FrameBuffer, now: Instant) -> Submission {
        let shared = &self.inner;
        shared.stats.frame_received();

        let Some(permit) = shared.gate.try_acquire(now) else {
            shared.stats.frame_rejected();
            trace!("Frame dropped by gate");
            return Submission::Rejected;
        };
        shared.stats.frame_admitted();

        let sequence = frame.sequence();
        let device_timestamp = frame.meta.device_timestamp;
        let image = match shared.decoder.decode(frame) {
            Ok(image) => image,
            Err(e) => {
                shared.stats.decode_failed();
                debug!("Dropping frame {}: {}", sequence, e);
                drop(permit);
                return Submission::DecodeFailed(e);
            }
        };

        let handle = self
            .runtime
            .spawn(analyze(Arc::clone(shared), permit, image, sequence, device_timestamp));
        Submission::Started(AnalysisTask { sequence, handle })
    }

    /// New settings apply from the next admitted frame.
    pub fn reconfigure(&self, settings: AnalysisSettings) {
        info!(
            "Reconfiguring: {} item(s), {:?} between frames",
            settings.item_count.get(),
            settings.min_interval
        );
        self.inner.gate.set_min_interval(settings.min_interval);
        self.inner.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> AnalysisSettings {
        **self.inner.settings.load()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.gate.is_in_flight()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }
}

/// `permit` lives until this returns, on every path.
async fn analyze(
    shared: Arc<Shared>,
    permit: GatePermit,
    image: DecodedImage,
    sequence: u64,
    device_timestamp: Option<Duration>,
) -> Result<(), FrameError> {
    let admitted_at = permit.admitted_at();
    let count = shared.settings.load().item_count;

    let generator = Arc::clone(&shared.generator);
    let swatches = match tokio::task::spawn_blocking(move || generator.generate(&image)).await {
        Ok(swatches) => swatches,
        Err(e) => {
            shared.stats.analysis_failed();
            warn!("Swatch generation for frame {} failed: {}", sequence, e);
            return Err(FrameError::Generator(e.to_string()));
        }
    };

    // Scratch state is reset inside aggregate(); a poisoned lock is still usable
    let ranking = shared
        .aggregator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .aggregate(&swatches, count);

    let elapsed = Instant::now().saturating_duration_since(admitted_at);
    metrics::histogram!("colorcast_analysis_seconds").record(elapsed.as_secs_f64());

    let report = ColorReport::new(sequence, ranking, elapsed).with_device_timestamp(device_timestamp);
    match deliver(&shared.sink, report) {
        Ok(()) => {
            shared.stats.report_delivered();
            trace!("Frame {} delivered after {:?}", sequence, elapsed);
            Ok(())
        }
        Err(e) => {
            shared.stats.delivery_failed();
            warn!("Report for frame {} not delivered: {}", sequence, e);
            Err(e.into())
        }
    }
}

fn deliver(sink: &Sender<ColorReport>, report: ColorReport) -> Result<(), DeliveryError> {
    sink.try_send(report).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryError::Backlogged {
            capacity: sink.capacity().unwrap_or(0),
        },
        TrySendError::Disconnected(_) => DeliveryError::Disconnected,
    })
}
