//! Per-cell playback unit
//!
//! Owns a recorded buffer (moved in from a capture slot), walks it with a
//! palindrome loop and re-stamps every frame on its own output clock. The
//! output cadence comes from the playback framerate, not from the rate the
//! frames were captured at.

use super::palindrome::PlaybackLoop;
use crate::compositor::FrameProducer;
use crate::error::{Error, Result};
use crate::recording::FrameBuffer;
use crate::types::{Framerate, Resolution, TimedFrame};

/// Output side of a playback slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Size of the grid cell the loop is shown in
    pub resolution: Resolution,
    /// Pacing of emitted timestamps
    pub framerate: Framerate,
}

impl OutputFormat {
    pub fn new(resolution: Resolution, framerate: Framerate) -> Self {
        Self {
            resolution,
            framerate,
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Resolution::CELL_180P, Framerate::FPS_30)
    }
}

/// Plays one recorded loop into one grid cell
#[derive(Debug)]
pub struct PlaybackSlot {
    cell_number: u32,
    playback: Option<PlaybackLoop>,
    format: OutputFormat,
    frame_duration: u64,
    next_pts: u64,
    frames_emitted: u64,
}

impl PlaybackSlot {
    /// Take ownership of `buffer` and prepare to play it into `cell_number`
    pub fn new(cell_number: u32, buffer: FrameBuffer, format: OutputFormat) -> Result<Self> {
        if cell_number == 0 {
            return Err(Error::InvalidCell(cell_number));
        }
        if !format.framerate.is_valid() {
            return Err(Error::Config(format!(
                "playback framerate {}/{} is not usable",
                format.framerate.num, format.framerate.den
            )));
        }

        let frame_duration = format.framerate.frame_duration_us();
        let playback = PlaybackLoop::new(buffer);
        tracing::info!(
            "Playback slot for cell {}: {} frames at {} ({} us per frame)",
            cell_number,
            playback.total_frames(),
            format.framerate,
            frame_duration
        );

        Ok(Self {
            cell_number,
            playback: Some(playback),
            format,
            frame_duration,
            next_pts: 0,
            frames_emitted: 0,
        })
    }

    /// Start the output clock at `base_us` instead of zero
    pub fn with_timestamp_base(mut self, base_us: u64) -> Self {
        self.next_pts = base_us;
        self
    }

    /// Emit the current loop frame stamped with the next output timestamp
    pub fn pull_next_frame(&mut self) -> Result<TimedFrame> {
        let playback = match self.playback.as_mut() {
            Some(playback) if playback.is_playing() => playback,
            _ => return Err(Error::Exhausted),
        };

        let frame = playback.current_frame()?.clone();
        let timed = TimedFrame {
            frame,
            pts: self.next_pts,
            duration: self.frame_duration,
        };
        self.next_pts += self.frame_duration;
        playback.advance();
        self.frames_emitted += 1;

        if self.frames_emitted % 300 == 0 {
            tracing::trace!(
                "Cell {}: {} frames emitted (index {}, {})",
                self.cell_number,
                self.frames_emitted,
                playback.current_index(),
                playback.direction()
            );
        }
        Ok(timed)
    }

    /// Is there a loop with frames to play?
    pub fn is_active(&self) -> bool {
        self.playback
            .as_ref()
            .map(PlaybackLoop::is_playing)
            .unwrap_or(false)
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    pub fn cell_number(&self) -> u32 {
        self.cell_number
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Fixed output duration per frame in microseconds
    pub fn frame_duration(&self) -> u64 {
        self.frame_duration
    }

    /// Loop frame index the next pull returns
    pub fn current_index(&self) -> Option<usize> {
        self.playback.as_ref().map(PlaybackLoop::current_index)
    }

    /// Frames in the loop (0 after cleanup)
    pub fn total_frames(&self) -> usize {
        self.playback
            .as_ref()
            .map(PlaybackLoop::total_frames)
            .unwrap_or(0)
    }

    /// Stop producing and release the loop together with the buffer it owns. Idempotent.
    pub fn cleanup(&mut self) {
        if let Some(playback) = self.playback.take() {
            let mut buffer = playback.into_buffer();
            buffer.cleanup();
            tracing::debug!(
                "Playback slot for cell {} cleaned up after {} frames",
                self.cell_number,
                self.frames_emitted
            );
        }
    }
}

impl FrameProducer for PlaybackSlot {
    fn pull_frame(&mut self) -> Option<TimedFrame> {
        match self.pull_next_frame() {
            Ok(frame) => Some(frame),
            Err(e) if e.is_invariant_violation() => {
                tracing::error!("Cell {}: {}", self.cell_number, e);
                None
            }
            Err(_) => None,
        }
    }
}

impl Drop for PlaybackSlot {
    fn drop(&mut self) {
        self.cleanup();
    }
}
