//! Palindrome playback state machine
//!
//! Walks a recorded buffer forward then backward, forever:
//! `0, 1, .., N-1, N-2, .., 1, 0, 1, ..`. Neither end frame is shown twice
//! in a row. The loop only tracks position and direction; frames stay in
//! the buffer it reads from.

use crate::error::{Error, Result};
use crate::recording::FrameBuffer;
use crate::types::Frame;

use std::borrow::Borrow;

/// Direction of travel through the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Palindrome cursor over a frame buffer.
///
/// `B` is anything that can lend a [`FrameBuffer`]: a plain reference when
/// the caller keeps the buffer, or the buffer itself when the loop travels
/// inside a playback slot.
#[derive(Debug)]
pub struct PlaybackLoop<B: Borrow<FrameBuffer> = FrameBuffer> {
    buffer: B,
    current_frame: usize,
    direction: Direction,
    total_frames: usize,
    playing: bool,
}

impl<B: Borrow<FrameBuffer>> PlaybackLoop<B> {
    /// Start at frame 0, moving forward. An empty buffer yields a loop that never plays.
    pub fn new(buffer: B) -> Self {
        let total_frames = buffer.borrow().frame_count();
        let playing = total_frames > 0;
        if playing {
            tracing::debug!(
                "Playback loop created: {} frames, starting at frame 0 (forward)",
                total_frames
            );
        } else {
            tracing::warn!("Playback loop created with empty buffer (0 frames)");
        }
        Self {
            buffer,
            current_frame: 0,
            direction: Direction::Forward,
            total_frames,
            playing,
        }
    }

    /// Step to the next frame of the palindrome
    pub fn advance(&mut self) {
        if !self.playing || self.total_frames <= 1 {
            return;
        }

        let last = self.total_frames - 1;
        match self.direction {
            Direction::Forward => {
                self.current_frame += 1;
                if self.current_frame >= last {
                    self.current_frame = last;
                    self.direction = Direction::Reverse;
                    tracing::trace!("Playback direction changed to reverse at frame {}", last);
                }
            }
            Direction::Reverse => {
                self.current_frame -= 1;
                if self.current_frame == 0 {
                    self.direction = Direction::Forward;
                    tracing::trace!("Playback direction changed to forward at frame 0");
                }
            }
        }
    }

    /// Borrow the frame at the current position
    pub fn current_frame(&self) -> Result<&Frame> {
        if self.current_frame >= self.total_frames {
            tracing::error!(
                "Playback index {} out of bounds (total frames {})",
                self.current_frame,
                self.total_frames
            );
            return Err(Error::OutOfBounds {
                index: self.current_frame,
                total: self.total_frames,
            });
        }
        self.buffer.borrow().read_frame(self.current_frame)
    }

    /// Index of the frame that the next read returns
    pub fn current_index(&self) -> usize {
        self.current_frame
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn buffer(&self) -> &FrameBuffer {
        self.buffer.borrow()
    }

    /// Drop the cursor and hand back the buffer untouched
    pub fn into_buffer(self) -> B {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameFormat;

    fn buffer_with(frames: u64) -> FrameBuffer {
        let mut buf = FrameBuffer::new(frames.max(1) as usize).unwrap();
        for i in 0..frames {
            buf.write_frame(Frame::new(2, 2, FrameFormat::Bgra).with_sequence(i));
        }
        buf
    }

    fn walk(buffer: &FrameBuffer, steps: usize) -> Vec<usize> {
        let mut lp = PlaybackLoop::new(buffer);
        let mut seen = Vec::with_capacity(steps);
        for _ in 0..steps {
            seen.push(lp.current_index());
            lp.advance();
        }
        seen
    }

    #[test]
    fn test_four_frame_palindrome() {
        let buf = buffer_with(4);
        assert_eq!(
            walk(&buf, 13),
            vec![0, 1, 2, 3, 2, 1, 0, 1, 2, 3, 2, 1, 0]
        );
    }

    #[test]
    fn test_two_frame_alternates() {
        let buf = buffer_with(2);
        assert_eq!(walk(&buf, 6), vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_single_frame_stays_put() {
        let buf = buffer_with(1);
        let mut lp = PlaybackLoop::new(&buf);
        for _ in 0..10 {
            lp.advance();
        }
        assert_eq!(lp.current_index(), 0);
        assert!(lp.is_playing());
        assert_eq!(lp.current_frame().unwrap().sequence, 0);
    }

    #[test]
    fn test_empty_buffer_not_playing() {
        let buf = buffer_with(0);
        let mut lp = PlaybackLoop::new(&buf);
        assert!(!lp.is_playing());
        lp.advance();
        assert_eq!(lp.current_index(), 0);
        assert!(matches!(
            lp.current_frame(),
            Err(Error::OutOfBounds { index: 0, total: 0 })
        ));
    }

    #[test]
    fn test_direction_flips_at_ends() {
        let buf = buffer_with(3);
        let mut lp = PlaybackLoop::new(&buf);
        assert_eq!(lp.direction(), Direction::Forward);
        lp.advance();
        assert_eq!(lp.direction(), Direction::Forward);
        lp.advance();
        assert_eq!((lp.current_index(), lp.direction()), (2, Direction::Reverse));
        lp.advance();
        lp.advance();
        assert_eq!((lp.current_index(), lp.direction()), (0, Direction::Forward));
    }

    #[test]
    fn test_frames_follow_index() {
        let buf = buffer_with(3);
        let mut lp = PlaybackLoop::new(&buf);
        let mut seq = Vec::new();
        for _ in 0..5 {
            seq.push(lp.current_frame().unwrap().sequence);
            lp.advance();
        }
        assert_eq!(seq, vec![0, 1, 2, 1, 0]);
    }

    #[test]
    fn test_into_buffer_returns_frames() {
        let lp = PlaybackLoop::new(buffer_with(5));
        let buf = lp.into_buffer();
        assert_eq!(buf.frame_count(), 5);
    }
}
