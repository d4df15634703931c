use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LockResult, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static POISON_REPORTED: AtomicBool = AtomicBool::new(false);

// a poisoned snapshot is plain data and still readable
fn recover<G>(result: LockResult<G>, operation: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        if !POISON_REPORTED.swap(true, Ordering::Relaxed) {
            warn!(operation, "metrics_lock_poisoned");
        }
        poisoned.into_inner()
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub frame_time_ms: f32,
    pub worst_frame_ms: f32,
    /// Mean of the clamped, smoothed step the simulation consumed.
    pub smoothed_dt_ms: f32,
    pub skipped_renders: u32,
}

#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *recover(self.latest.read(), "read")
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *recover(self.latest.write(), "write") = snapshot;
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    window_start: Instant,
    window: Duration,
    frames: u32,
    skipped_renders: u32,
    raw_total: Duration,
    raw_worst: Duration,
    smoothed_total_seconds: f32,
}

impl MetricsAccumulator {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window_start: Instant::now(),
            window,
            frames: 0,
            skipped_renders: 0,
            raw_total: Duration::ZERO,
            raw_worst: Duration::ZERO,
            smoothed_total_seconds: 0.0,
        }
    }

    pub(crate) fn record_frame(&mut self, raw_dt: Duration, smoothed_seconds: f32) {
        self.frames = self.frames.saturating_add(1);
        self.raw_total = self.raw_total.saturating_add(raw_dt);
        self.raw_worst = self.raw_worst.max(raw_dt);
        if smoothed_seconds.is_finite() {
            self.smoothed_total_seconds += smoothed_seconds;
        }
    }

    pub(crate) fn record_skipped_render(&mut self) {
        self.skipped_renders = self.skipped_renders.saturating_add(1);
    }

    /// Closes the window once it has run its length and starts the next one.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let per_frame = |total: f32| {
            if self.frames == 0 {
                0.0
            } else {
                total / self.frames as f32
            }
        };
        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed.as_secs_f32().max(f32::EPSILON),
            frame_time_ms: per_frame(self.raw_total.as_secs_f32()) * 1000.0,
            worst_frame_ms: self.raw_worst.as_secs_f32() * 1000.0,
            smoothed_dt_ms: per_frame(self.smoothed_total_seconds) * 1000.0,
            skipped_renders: self.skipped_renders,
        };

        *self = Self {
            window_start: now,
            ..Self::new(self.window)
        };
        Some(snapshot)
    }
}
