//! Recording module
//!
//! Provides the capture side of the looper:
//! - Ring buffer of recorded frames
//! - Per-key capture slots fed by the stream junction
//! - Hold timing per key

mod buffer;
mod slot;
mod state;

pub use buffer::FrameBuffer;
pub use slot::{BufferedSlotFactory, CaptureSlot, CaptureSlotFactory};
pub use state::RecordingTimer;
