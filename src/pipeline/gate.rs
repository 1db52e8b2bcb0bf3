//! Throttled single-flight admission for preview frames

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug)]
struct GateState {
    min_interval: Duration,
    in_flight: bool,
    last_admitted: Option<Instant>,
}

/// Admits at most one frame at a time, and no more often than `min_interval`.
///
/// Rejected frames are not queued. An admitted frame holds a [`GatePermit`]
/// until it is dropped, which is the only way to release the gate.
#[derive(Debug, Clone)]
pub struct FrameGate {
    state: Arc<Mutex<GateState>>,
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl FrameGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState {
                min_interval,
                in_flight: false,
                last_admitted: None,
            })),
        }
    }

    // Two scalars, always consistent between statements
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admission check and in-flight mark happen under one lock.
    pub fn try_acquire(&self, now: Instant) -> Option<GatePermit> {
        let mut state = self.lock();
        if state.in_flight {
            return None;
        }
        if let Some(last) = state.last_admitted {
            if now.saturating_duration_since(last) < state.min_interval {
                return None;
            }
        }
        state.in_flight = true;
        state.last_admitted = Some(now);
        drop(state);

        Some(GatePermit {
            gate: self.clone(),
            admitted_at: now,
        })
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    pub fn min_interval(&self) -> Duration {
        self.lock().min_interval
    }

    /// Applies from the next admission check on.
    pub fn set_min_interval(&self, min_interval: Duration) {
        self.lock().min_interval = min_interval;
    }

    fn release(&self) {
        self.lock().in_flight = false;
    }
}

/// Proof of admission; releases the gate when dropped.
#[derive(Debug)]
#[must_use = "dropping the permit releases the gate immediately"]
pub struct GatePermit {
    gate: FrameGate,
    admitted_at: Instant,
}

impl GatePermit {
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn first_frame_is_always_admitted() {
        let gate = FrameGate::default();
        assert!(gate.try_acquire(Instant::now()).is_some());
        assert!(gate.is_in_flight());
    }

    #[test]
    fn interval_boundary() {
        let gate = FrameGate::new(1000 * MS);
        let t0 = Instant::now();
        drop(gate.try_acquire(t0).unwrap());

        assert!(gate.try_acquire(t0 + 999 * MS).is_none());
        assert!(gate.try_acquire(t0 + 1000 * MS).is_some());
    }

    #[test]
    fn in_flight_frame_blocks_regardless_of_elapsed_time() {
        let gate = FrameGate::new(1000 * MS);
        let t0 = Instant::now();
        let permit = gate.try_acquire(t0).unwrap();

        assert!(gate.try_acquire(t0 + 60_000 * MS).is_none());
        drop(permit);
        assert!(!gate.is_in_flight());
        assert!(gate.try_acquire(t0 + 60_000 * MS).is_some());
    }

    #[test]
    fn rejection_does_not_move_the_window() {
        let gate = FrameGate::new(100 * MS);
        let t0 = Instant::now();
        drop(gate.try_acquire(t0).unwrap());

        assert!(gate.try_acquire(t0 + 50 * MS).is_none());
        assert!(gate.try_acquire(t0 + 100 * MS).is_some());
    }

    #[test]
    fn zero_interval_only_enforces_single_flight() {
        let gate = FrameGate::new(Duration::ZERO);
        let t0 = Instant::now();
        let first = gate.try_acquire(t0).unwrap();

        assert!(gate.try_acquire(t0).is_none());
        drop(first);
        assert!(gate.try_acquire(t0).is_some());
    }

    #[test]
    fn interval_change_applies_to_next_check() {
        let gate = FrameGate::new(1000 * MS);
        let t0 = Instant::now();
        drop(gate.try_acquire(t0).unwrap());

        gate.set_min_interval(10 * MS);
        assert_eq!(gate.min_interval(), 10 * MS);
        assert!(gate.try_acquire(t0 + 10 * MS).is_some());
    }

    #[test]
    fn concurrent_acquires_admit_exactly_one() {
        let gate = FrameGate::new(Duration::ZERO);
        let now = Instant::now();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    gate.try_acquire(now).map(std::mem::forget).is_some()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(admitted, 1);
        assert!(gate.is_in_flight());
    }
}
