//! Hold timing for each recording key

use crate::config::MIN_RECORDING_DURATION_US;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
struct KeyTiming {
    started: Option<Instant>,
    last_duration: Option<Duration>,
}

/// Tracks when each key was pressed and how long its last hold lasted
#[derive(Debug, Clone)]
pub struct RecordingTimer {
    keys: Vec<KeyTiming>,
}

impl RecordingTimer {
    /// Timer for keys `1..=keys`
    pub fn new(keys: u32) -> Self {
        Self {
            keys: vec![KeyTiming::default(); keys as usize],
        }
    }

    fn entry(&mut self, key: u32) -> Option<&mut KeyTiming> {
        let index = (key as usize).checked_sub(1)?;
        self.keys.get_mut(index)
    }

    fn get(&self, key: u32) -> Option<&KeyTiming> {
        let index = (key as usize).checked_sub(1)?;
        self.keys.get(index)
    }

    /// Start (or restart) timing `key`. Returns false for an unknown key.
    pub fn press(&mut self, key: u32, now: Instant) -> bool {
        match self.entry(key) {
            Some(timing) => {
                timing.started = Some(now);
                timing.last_duration = None;
                true
            }
            None => false,
        }
    }

    /// Stop timing `key` and return the hold duration.
    ///
    /// Holds shorter than one frame are credited as one frame.
    pub fn release(&mut self, key: u32, now: Instant) -> Option<Duration> {
        let timing = self.entry(key)?;
        let started = timing.started.take()?;
        let min = Duration::from_micros(MIN_RECORDING_DURATION_US);
        let mut held = now.saturating_duration_since(started);
        if held < min {
            tracing::info!(
                "Key {} held {:?}, shorter than one frame; counting {:?}",
                key,
                held,
                min
            );
            held = min;
        }
        timing.last_duration = Some(held);
        Some(held)
    }

    /// Forget an in-progress hold without recording a duration
    pub fn cancel(&mut self, key: u32) {
        if let Some(timing) = self.entry(key) {
            timing.started = None;
        }
    }

    pub fn is_recording(&self, key: u32) -> bool {
        self.get(key).map(|t| t.started.is_some()).unwrap_or(false)
    }

    pub fn started_at(&self, key: u32) -> Option<Instant> {
        self.get(key).and_then(|t| t.started)
    }

    pub fn last_duration(&self, key: u32) -> Option<Duration> {
        self.get(key).and_then(|t| t.last_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_release_duration() {
        let mut timer = RecordingTimer::new(4);
        let t0 = Instant::now();
        assert!(timer.press(2, t0));
        assert!(timer.is_recording(2));
        let held = timer.release(2, t0 + Duration::from_millis(500)).unwrap();
        assert_eq!(held, Duration::from_millis(500));
        assert!(!timer.is_recording(2));
        assert_eq!(timer.last_duration(2), Some(held));
    }

    #[test]
    fn test_short_hold_rounds_up() {
        let mut timer = RecordingTimer::new(4);
        let t0 = Instant::now();
        timer.press(1, t0);
        let held = timer.release(1, t0 + Duration::from_millis(5)).unwrap();
        assert_eq!(held, Duration::from_micros(MIN_RECORDING_DURATION_US));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut timer = RecordingTimer::new(4);
        let t0 = Instant::now();
        assert!(!timer.press(0, t0));
        assert!(!timer.press(5, t0));
        assert_eq!(timer.release(5, t0), None);
        assert!(!timer.is_recording(0));
    }

    #[test]
    fn test_release_without_press() {
        let mut timer = RecordingTimer::new(2);
        assert_eq!(timer.release(1, Instant::now()), None);
    }
}
