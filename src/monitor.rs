//! Frame rate monitoring and drop detection
//!
//! Keeps a sliding window of frame arrival times and derives:
//! - average, min and max fps over the window
//! - dropped frames (gaps longer than 1.5x the expected interval)
//! - a validation verdict against a target rate

use crate::types::Framerate;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frames kept in the measurement window
pub const WINDOW_SIZE: usize = 300;

/// Frames needed before the rate can be validated
pub const MIN_SAMPLES: usize = 30;

/// Verdict of [`FrameMonitor::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpsStatus {
    Valid,
    Low,
    High,
    Unstable,
    InsufficientData,
}

impl std::fmt::Display for FpsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FpsStatus::Valid => write!(f, "valid"),
            FpsStatus::Low => write!(f, "low (below minimum)"),
            FpsStatus::High => write!(f, "high (above maximum)"),
            FpsStatus::Unstable => write!(f, "unstable (high variance)"),
            FpsStatus::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

/// Snapshot of the measurement window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FpsStats {
    pub total_frames: u64,
    pub dropped_frames: u64,
    pub current_fps: f64,
    pub average_fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub std_dev: f64,
    pub window_duration: Duration,
}

pub struct FrameMonitor {
    target: Framerate,
    tolerance_fps: f64,
    times: VecDeque<Instant>,
    total_frames: u64,
    dropped_frames: u64,
}

impl FrameMonitor {
    pub fn new(target: Framerate, tolerance_fps: f64) -> Self {
        tracing::debug!(
            "Frame monitor created (window={} frames, target={}, tolerance={} fps)",
            WINDOW_SIZE,
            target,
            tolerance_fps
        );
        Self {
            target,
            tolerance_fps,
            times: VecDeque::with_capacity(WINDOW_SIZE + 1),
            total_frames: 0,
            dropped_frames: 0,
        }
    }

    fn expected_interval(&self) -> Duration {
        self.target.frame_interval()
    }

    /// Record a frame arrival. Returns the number of frames judged missing before it.
    pub fn on_frame(&mut self, now: Instant) -> u64 {
        self.total_frames += 1;
        let mut missing = 0;

        if let Some(&last) = self.times.back() {
            let expected = self.expected_interval();
            let gap = now.saturating_duration_since(last);
            if !expected.is_zero() && gap > expected * 3 / 2 {
                missing = (gap.as_nanos() / expected.as_nanos()) as u64 - 1;
                if missing > 0 {
                    self.dropped_frames += missing;
                    tracing::warn!(
                        "Frame drop detected: gap={:?} (expected ~{:?}), missing frames={}",
                        gap,
                        expected,
                        missing
                    );
                }
            }
        }

        self.times.push_back(now);
        if self.times.len() > WINDOW_SIZE {
            self.times.pop_front();
        }
        missing
    }

    pub fn stats(&self) -> FpsStats {
        let mut stats = FpsStats {
            total_frames: self.total_frames,
            dropped_frames: self.dropped_frames,
            ..Default::default()
        };
        let (Some(&first), Some(&last)) = (self.times.front(), self.times.back()) else {
            return stats;
        };
        if self.times.len() < 2 || last <= first {
            return stats;
        }

        let window = last - first;
        stats.window_duration = window;
        stats.average_fps = (self.times.len() - 1) as f64 / window.as_secs_f64();

        let rates: Vec<f64> = self
            .times
            .iter()
            .zip(self.times.iter().skip(1))
            .filter(|(prev, cur)| cur > prev)
            .map(|(prev, cur)| 1.0 / (*cur - *prev).as_secs_f64())
            .collect();

        if let Some(&current) = rates.last() {
            stats.current_fps = current;
            let mean = rates.iter().sum::<f64>() / rates.len() as f64;
            let var = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rates.len() as f64;
            stats.std_dev = var.sqrt();
            stats.min_fps = rates.iter().copied().fold(f64::INFINITY, f64::min);
            stats.max_fps = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        }
        stats
    }

    /// Compare the window average against target ± tolerance
    pub fn validate(&self) -> FpsStatus {
        if self.times.len() < MIN_SAMPLES {
            return FpsStatus::InsufficientData;
        }
        let stats = self.stats();
        let target = self.target.as_f64();
        if stats.average_fps < target - self.tolerance_fps {
            FpsStatus::Low
        } else if stats.average_fps > target + self.tolerance_fps {
            FpsStatus::High
        } else if stats.std_dev > target * 0.1 {
            FpsStatus::Unstable
        } else {
            FpsStatus::Valid
        }
    }

    pub fn has_sufficient_data(&self) -> bool {
        self.times.len() >= MIN_SAMPLES
    }

    pub fn window_len(&self) -> usize {
        self.times.len()
    }

    /// Forget everything measured so far
    pub fn reset(&mut self) {
        self.times.clear();
        self.total_frames = 0;
        self.dropped_frames = 0;
    }

    /// Log a one-line summary
    pub fn log_summary(&self) {
        let stats = self.stats();
        tracing::info!(
            "Frames: {} total, {} dropped, {:.1} fps avg ({:.1}-{:.1}), {}",
            stats.total_frames,
            stats.dropped_frames,
            stats.average_fps,
            stats.min_fps,
            stats.max_fps,
            self.validate()
        );
    }
}
