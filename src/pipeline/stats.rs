//! Per-pipeline frame counters

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

/// Counters bumped from the producer thread and the analysis tasks.
///
/// Each event is also reported to the `metrics` facade under the same name.
#[derive(Debug, Default)]
pub struct PipelineStats {
    inner: CachePadded<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    decode_failures: AtomicU64,
    analysis_failures: AtomicU64,
    delivered: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub admitted: u64,
    pub rejected: u64,
    pub decode_failures: u64,
    pub analysis_failures: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
}

macro_rules! record {
    ($fn_name:ident, $field:ident, $metric:literal) => {
        pub(crate) fn $fn_name(&self) {
            self.inner.$field.fetch_add(1, Ordering::Relaxed);
            metrics::counter!($metric).increment(1);
        }
    };
}

impl PipelineStats {
    record!(frame_received, received, "colorcast_frames_received_total");
    record!(frame_admitted, admitted, "colorcast_frames_admitted_total");
    record!(frame_rejected, rejected, "colorcast_frames_rejected_total");
    record!(decode_failed, decode_failures, "colorcast_decode_failures_total");
    record!(analysis_failed, analysis_failures, "colorcast_analysis_failures_total");
    record!(report_delivered, delivered, "colorcast_reports_delivered_total");
    record!(delivery_failed, delivery_failures, "colorcast_delivery_failures_total");

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.inner;
        StatsSnapshot {
            received: c.received.load(Ordering::Relaxed),
            admitted: c.admitted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            analysis_failures: c.analysis_failures.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            delivery_failures: c.delivery_failures.load(Ordering::Relaxed),
        }
    }
}
