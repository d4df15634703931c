use std::time::{Duration, Instant};

use crate::config::FrameConfig;

/// Turns display-refresh timestamps into the smoothed, clamped step every
/// downstream component consumes.
#[derive(Debug, Clone)]
pub struct FrameClock {
    min_delta: Duration,
    max_delta: Duration,
    keep: f32,
    smoothed_seconds: f32,
    last_instant: Option<Instant>,
}

impl FrameClock {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            min_delta: duration_from_ms(config.min_delta_ms),
            max_delta: duration_from_ms(config.max_delta_ms),
            keep: config.smoothing_keep,
            smoothed_seconds: config.initial_delta_ms / 1000.0,
            last_instant: None,
        }
    }

    /// Smoothed step in seconds for the frame ending at `now`. The first call
    /// has no previous timestamp and returns the seeded value.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let Some(last) = self.last_instant.replace(now) else {
            return self.smoothed_seconds;
        };
        self.advance(now.saturating_duration_since(last))
    }

    pub fn advance(&mut self, raw: Duration) -> f32 {
        let clamped = clamp_frame_delta(raw, self.min_delta, self.max_delta).as_secs_f32();
        self.smoothed_seconds = self.smoothed_seconds * self.keep + clamped * (1.0 - self.keep);
        self.smoothed_seconds
    }

    pub fn smoothed_seconds(&self) -> f32 {
        self.smoothed_seconds
    }
}

pub(crate) fn clamp_frame_delta(raw: Duration, min: Duration, max: Duration) -> Duration {
    raw.clamp(min, max.max(min))
}

fn duration_from_ms(ms: f32) -> Duration {
    Duration::from_secs_f32(ms.max(0.0) / 1000.0)
}
