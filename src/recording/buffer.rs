//! Fixed-capacity ring buffer of recorded frames
//!
//! When the buffer is full the oldest frame is released and replaced,
//! so a long hold keeps the most recent `capacity` frames.

use crate::config::FALLBACK_FRAME_DURATION_US;
use crate::error::{Error, Result};
use crate::types::Frame;

/// Circular frame store for one recording
#[derive(Debug)]
pub struct FrameBuffer {
    slots: Vec<Option<Frame>>,
    capacity: usize,
    write_pos: usize,
    frame_count: usize,
    duration_us: u64,
    overflow_count: usize,
    total_frames_written: usize,
}

impl FrameBuffer {
    /// Create an empty buffer holding at most `capacity` frames
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            tracing::error!("Cannot create frame buffer with zero capacity");
            return Err(Error::InvalidCapacity);
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|e| Error::AllocationFailed(format!("{} frame slots: {}", capacity, e)))?;
        slots.resize_with(capacity, || None);

        tracing::debug!("Frame buffer created: capacity={} frames", capacity);
        Ok(Self {
            slots,
            capacity,
            write_pos: 0,
            frame_count: 0,
            duration_us: 0,
            overflow_count: 0,
            total_frames_written: 0,
        })
    }

    /// Append a frame, overwriting the oldest one when full
    pub fn write_frame(&mut self, frame: Frame) {
        if self.slots.len() != self.capacity {
            // Storage was released by cleanup()
            self.slots.resize_with(self.capacity, || None);
        }

        if self.frame_count < self.capacity {
            self.frame_count += 1;
        } else {
            self.slots[self.write_pos] = None;
            self.overflow_count += 1;
            if self.overflow_count == 1 {
                tracing::warn!(
                    "Buffer full ({} frames), discarding oldest frames from now on",
                    self.capacity
                );
            } else {
                tracing::trace!(
                    "Buffer overflow: discarded oldest frame at position {} (total overflows: {})",
                    self.write_pos,
                    self.overflow_count
                );
            }
        }

        self.duration_us += frame.duration.unwrap_or(FALLBACK_FRAME_DURATION_US);
        self.slots[self.write_pos] = Some(frame);
        self.write_pos = (self.write_pos + 1) % self.capacity;
        self.total_frames_written += 1;
    }

    /// Borrow the frame at `index`, where 0 is the oldest frame held
    pub fn read_frame(&self, index: usize) -> Result<&Frame> {
        if index >= self.frame_count {
            return Err(Error::OutOfRange {
                index,
                count: self.frame_count,
            });
        }

        let physical = if self.frame_count < self.capacity {
            index
        } else {
            (self.write_pos + index) % self.capacity
        };

        self.slots[physical].as_ref().ok_or_else(|| {
            tracing::error!(
                "Frame at index {} (physical {}) is missing",
                index,
                physical
            );
            Error::Internal(format!("empty slot {} inside frame range", physical))
        })
    }

    /// Iterate frames oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Frame> + '_ {
        (0..self.frame_count).filter_map(move |i| self.read_frame(i).ok())
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Sum of frame durations written, in microseconds.
    ///
    /// Frames without a declared duration count as 33,333 µs, so this is an
    /// approximation for sources that do not stamp durations. Overwritten
    /// frames stay counted.
    pub fn duration_us(&self) -> u64 {
        self.duration_us
    }

    pub fn overflow_count(&self) -> usize {
        self.overflow_count
    }

    pub fn total_frames_written(&self) -> usize {
        self.total_frames_written
    }

    /// Release every held frame and the slot storage and zero the counters,
    /// leaving the buffer as if freshly created. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        if self.slots.is_empty() && self.total_frames_written == 0 {
            return;
        }
        tracing::debug!(
            "Cleaning up frame buffer (frame_count={}, capacity={})",
            self.frame_count,
            self.capacity
        );
        self.slots = Vec::new();
        self.write_pos = 0;
        self.frame_count = 0;
        self.duration_us = 0;
        self.overflow_count = 0;
        self.total_frames_written = 0;
    }
}
